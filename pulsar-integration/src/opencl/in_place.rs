//! In-place kernels: one work-group compacts one row of a buffer.
//!
//! The row is consumed in chunks of `threads * items * integration` samples.
//! A chunk is staged in local memory before anything is written back, and
//! every output index lies below the start of its own window, so results
//! never overwrite samples a later chunk still has to read.

use pulsar_core::Result;

use super::KernelGeometry;
use crate::mode::IntegrationMode;
use crate::template::{ItemTemplate, Skeleton, Slot, SlotFills};

pub(super) fn render(name: &str, g: &KernelGeometry) -> Result<String> {
    let it = g.int_type.name();
    let data = g.scalar.name();
    let threads = g.nr_threads;
    let items = g.nr_items;
    let f = g.integration;
    let chunk = g.chunk_len();
    let layout = &g.layouts.input;
    let row = match g.mode {
        IntegrationMode::InPlaceBeforeDedispersion => "channel",
        _ => "dm",
    };

    let mut sk = Skeleton::new();
    sk.text(format!(
        "__kernel void {name}(__global {data} * const restrict data) {{\n"
    ))
    .text(format!("{it} beam = get_group_id(2);\n"))
    .text(format!("{it} {row} = get_group_id(1);\n"))
    .text(format!("__local {data} buffer[{chunk}];\n"))
    .text(format!(
        "{it} inGlobalMemory = (beam * {}) + ({row} * {});\n",
        layout.stride(0),
        layout.stride(1)
    ))
    .text(format!(
        "for ( {it} chunk = 0; chunk < {}; chunk += {chunk} ) {{\n",
        g.nr_samples
    ))
    .text(format!(
        "for ( {it} item = get_local_id(0); item < {chunk}; item += {threads} ) {{\n"
    ))
    .text(format!("if ( chunk + item < {} ) {{\n", g.nr_samples))
    .text("buffer[item] = data[inGlobalMemory + chunk + item];\n")
    .text("} else {\n")
    .text("buffer[item] = 0;\n")
    .text("}\n")
    .text("}\n")
    .text("barrier(CLK_LOCAL_MEM_FENCE);\n")
    .slot(Slot::Defs)
    .text(format!("for ( {it} sample = 0; sample < {f}; sample++ ) {{\n"))
    .slot(Slot::Sum)
    .text("}\n")
    .slot(Slot::Store)
    .text("barrier(CLK_LOCAL_MEM_FENCE);\n")
    .text("}\n")
    .text("}\n");

    let defs = ItemTemplate::parse(&format!("{data} integratedSample{{n}} = 0;\n"));
    let sum = ItemTemplate::parse(&format!(
        "integratedSample{{n}} += buffer[(get_local_id(0) * {f}) + sample{{+offset}}];\n"
    ));
    let store = ItemTemplate::parse(&format!(
        "if ( (chunk / {f}) + get_local_id(0){{+offset}} < {out} ) {{\n\
         data[inGlobalMemory + (chunk / {f}) + get_local_id(0){{+offset}}] = {value};\n\
         }}\n",
        out = g.nr_integrated_samples,
        value = g.scalar.store_expr("integratedSample{n}", f)
    ));

    let mut fills = SlotFills::new();
    fills
        .set(Slot::Defs, defs.render_items(items, |_| 0))
        .set(
            Slot::Sum,
            sum.render_items(items, |k| {
                (u64::from(k) * u64::from(threads)).saturating_mul(u64::from(f))
            }),
        )
        .set(
            Slot::Store,
            store.render_items(items, |k| u64::from(k) * u64::from(threads)),
        );
    sk.render(&fills)
}

#[cfg(test)]
mod tests {
    use crate::conf::IntegrationConf;
    use crate::opencl::{
        integration_after_dedispersion_in_place_opencl,
        integration_before_dedispersion_in_place_opencl,
    };
    use crate::scalar::ScalarType;
    use crate::shape::ObservationShape;

    #[test]
    fn test_after_dedispersion_walks_dm_rows() {
        let shape = ObservationShape::new(3, 1000).with_beams(2);
        let src = integration_after_dedispersion_in_place_opencl(
            &IntegrationConf::new(4, 2),
            &shape,
            &ScalarType::new("float", 4),
            8,
            64,
        )
        .unwrap()
        .into_source();
        assert!(src.starts_with(
            "__kernel void integration8(__global float * const restrict data) {\n"
        ));
        assert!(src.contains("unsigned int dm = get_group_id(1);\n"));
        assert!(src.contains("__local float buffer[64];\n"));
        assert!(src.contains("unsigned int inGlobalMemory = (beam * 3024) + (dm * 1008);\n"));
        assert!(src.contains("chunk < 1000; chunk += 64"));
        assert!(src.contains("integratedSample1 += buffer[(get_local_id(0) * 8) + sample + 32];\n"));
        assert!(src.contains(
            "if ( (chunk / 8) + get_local_id(0) + 4 < 125 ) {\n\
             data[inGlobalMemory + (chunk / 8) + get_local_id(0) + 4] = integratedSample1 * 0.125f;\n"
        ));
        assert_eq!(src.matches("barrier(CLK_LOCAL_MEM_FENCE);").count(), 2);
    }

    #[test]
    fn test_before_dedispersion_walks_channels_of_dispersed_batch() {
        let shape = ObservationShape::new(3, 1000)
            .with_channels(16)
            .with_dispersed_samples(1200);
        let src = integration_before_dedispersion_in_place_opencl(
            &IntegrationConf::new(8, 1),
            &shape,
            &ScalarType::new("int", 4),
            10,
            0,
        )
        .unwrap()
        .into_source();
        assert!(src.contains("unsigned int channel = get_group_id(1);\n"));
        assert!(src.contains("(channel * 1200)"));
        assert!(src.contains("chunk < 1200; chunk += 80"));
        assert!(src.contains("< 120 ) {\n"));
        assert!(src.contains("= integratedSample0 / 10;\n"));
        assert!(!src.contains("integratedSample1"));
    }
}
