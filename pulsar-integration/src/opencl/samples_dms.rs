//! Samples-major kernel: each work-item owns `items` DMs of one output sample.
//!
//! DMs are contiguous, so work-items reading neighbouring DMs coalesce and no
//! local memory or reduction is needed.

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
    .text(format!("{it} firstSample = get_group_id(1) * {f};\n"))
    .text(format!(
        "{it} dm = (get_group_id(0) * {}) + get_local_id(0);\n",
        u64::from(threads) * u64::from(items)
    ))
    .slot(Slot::Defs)
    .text("\n")
    .text(format!(
        "for ( {it} sample = firstSample; sample < firstSample + {f}; sample++ ) {{\n"
    ))
    .slot(Slot::Sum)
    .text("}\n")
    .slot(Slot::Store)
    .text("}\n");

    let defs = ItemTemplate::parse(&format!("{data} integratedSample{{n}} = 0;\n"));
    let sum = ItemTemplate::parse(&format!(
        "integratedSample{{n}} += input[(beam * {}) + (sample * {}) + (dm{{+offset}})];\n",
        input.stride(0),
        input.stride(1)
    ));
    let store = ItemTemplate::parse(&format!(
        "output[(beam * {}) + (get_group_id(1) * {}) + (dm{{+offset}})] = {};\n",
        output.stride(0),
        output.stride(1),
        g.scalar.store_expr("integratedSample{n}", f)
    ));
    let dm_offset = |k: u32| u64::from(k) * u64::from(threads);

    let mut fills = SlotFills::new();
    fills
        .set(Slot::Defs, defs.render_items(items, |_| 0))
        .set(Slot::Sum, sum.render_items(items, dm_offset))
        .set(Slot::Store, store.render_items(items, dm_offset));
    sk.render(&fills)
}
