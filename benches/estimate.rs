extern crate criterion;
extern crate tiff_budget;

use criterion::{black_box, BenchmarkId, Criterion};
use tiff_budget::{
    check_decode, ChunkLayout, DecodeArea, DecodeOptions, ImageDescriptor, MemoryBudget,
};

fn main() {
    let mut c = Criterion::default().configure_from_args();
    let mut group = c.benchmark_group("budget-check");

    let cases = [
        (
            "single",
            ImageDescriptor::new(8000, 8000, ChunkLayout::Single),
            DecodeOptions::new(),
        ),
        (
            "strips",
            ImageDescriptor::new(8000, 8000, ChunkLayout::Strips { rows_per_strip: 16 }),
            DecodeOptions::new().with_sample_size(2),
        ),
        (
            "tiles-area",
            ImageDescriptor::new(
                16384,
                16384,
                ChunkLayout::Tiles {
                    width: 256,
                    height: 256,
                },
            ),
            DecodeOptions::new().with_decode_area(DecodeArea::new(1000, 1000, 4096, 4096)),
        ),
    ];

    let budget = MemoryBudget::default();
    for (id, image, options) in cases {
        group.bench_with_input(
            BenchmarkId::from_parameter(id),
            &(image, options),
            |b, (image, options)| {
                b.iter(|| check_decode(black_box(image), black_box(options), &budget))
            },
        );
    }

    group.finish();
}
