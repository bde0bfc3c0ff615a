//! DMs-major kernel: one work-group per `items` output samples of one DM.
//!
//! Work-items stride over each window accumulating partial sums, park them
//! in local memory, then tree-reduce every item's `threads` partials. The
//! first `items` work-items write the results.

use pulsar_core::Result;

use super::KernelGeometry;
use crate::template::{ItemTemplate, Skeleton, Slot, SlotFills};

pub(super) fn render(name: &str, g: &KernelGeometry) -> Result<String> {
    let it = g.int_type.name();
    let data = g.scalar.name();
    let threads = g.nr_threads;
    let items = g.nr_items;
    let f = g.integration;
    let input = &g.layouts.input;
    let output = &g.layouts.output;

    let mut sk = Skeleton::new();
    sk.text(format!(
        "__kernel void {name}(__global const {data} * const restrict input, \
         __global {data} * const restrict output) {{\n"
    ))
    .text(format!("{it} beam = get_group_id(2);\n"))
    .text(format!("{it} dm = get_group_id(1);\n"))
    .text(format!(
        "__local {data} buffer[{}];\n",
        u64::from(threads) * u64::from(items)
    ))
    .text(format!(
        "{it} inGlobalMemory = (beam * {}) + (dm * {}) + (get_group_id(0) * {});\n",
        input.stride(0),
        input.stride(1),
        u64::from(f) * u64::from(items)
    ))
    .slot(Slot::Defs)
    .text("\n// First computing phase\n")
    .text(format!(
        "for ( {it} sample = get_local_id(0); sample < {f}; sample += {threads} ) {{\n"
    ))
    .slot(Slot::Sum)
    .text("}\n")
    .slot(Slot::Load)
    .text("barrier(CLK_LOCAL_MEM_FENCE);\n")
    .text("// Reduce\n")
    .text(format!("{it} threshold = {};\n", threads / 2))
    .text(format!(
        "for ( {it} sample = get_local_id(0); threshold > 0; threshold /= 2 ) {{\n"
    ))
    .text("if ( sample < threshold ) {\n")
    .slot(Slot::Reduce)
    .text("}\n")
    .text("barrier(CLK_LOCAL_MEM_FENCE);\n")
    .text("}\n")
    .text(format!(
        "inGlobalMemory = (beam * {}) + (dm * {}) + (get_group_id(0) * {items});\n",
        output.stride(0),
        output.stride(1)
    ))
    .text(format!("if ( get_local_id(0) < {items} ) {{\n"))
    .slot(Slot::Store)
    .text("}\n")
    .text("}\n");

    let defs = ItemTemplate::parse(&format!("{data} integratedSample{{n}} = 0;\n"));
    let sum = ItemTemplate::parse(
        "integratedSample{n} += input[inGlobalMemory + sample{+offset}];\n",
    );
    let load = ItemTemplate::parse("buffer[get_local_id(0){+offset}] = integratedSample{n};\n");
    let reduce = ItemTemplate::parse(
        "integratedSample{n} += buffer[(sample{+offset}) + threshold];\n\
         buffer[sample{+offset}] = integratedSample{n};\n",
    );
    let local_offset = |k: u32| u64::from(k) * u64::from(threads);

    let mut fills = SlotFills::new();
    fills
        .set(Slot::Defs, defs.render_items(items, |_| 0))
        .set(
            Slot::Sum,
            sum.render_items(items, |k| u64::from(k) * u64::from(f)),
        )
        .set(Slot::Load, load.render_items(items, local_offset))
        .set(Slot::Reduce, reduce.render_items(items, local_offset))
        .set(
            Slot::Store,
            format!(
                "output[inGlobalMemory + get_local_id(0)] = {};\n",
                g.scalar
                    .store_expr(&format!("buffer[get_local_id(0) * {threads}]"), f)
            ),
        );
    sk.render(&fills)
}
