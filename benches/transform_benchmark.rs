use std::io::Cursor;

use criterion::{criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imgpress::processing::{CodecOperation, SourceFormat};
use imgpress::{CompressionType, ImageCrateCodec};

fn sample_png() -> Vec<u8> {
    let image = RgbImage::from_fn(128, 128, |x, y| Rgb([x as u8, y as u8, (x ^ y) as u8]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode sample");
    buf
}

fn benchmark_png_dispatch(c: &mut Criterion) {
    let codec = ImageCrateCodec::new();
    let source = sample_png();

    let mut group = c.benchmark_group("png");
    for compression in [CompressionType::Lossless, CompressionType::Lossy] {
        let operation = CodecOperation::select(SourceFormat::Png, compression, 75, false);
        group.bench_function(compression.as_str(), |b| {
            b.iter(|| operation.apply(&codec, &source).expect("compress"));
        });
    }
    group.finish();
}

fn benchmark_compat_transcode(c: &mut Criterion) {
    let codec = ImageCrateCodec::new();
    let source = sample_png();
    let operation = CodecOperation::select(SourceFormat::Jpeg, CompressionType::Lossless, 75, true);

    c.bench_function("png_to_jpeg", |b| {
        b.iter(|| operation.apply(&codec, &source).expect("transcode"));
    });
}

criterion_group!(benches, benchmark_png_dispatch, benchmark_compat_transcode);
criterion_main!(benches);
