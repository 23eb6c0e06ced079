//! Separable Gaussian blur over premultiplied colour
//!
//! Samples outside the raster count as transparent black, so edges fade out the
//! same way a canvas `blur()` filter clipped to its surface does.

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Normalized 1-D Gaussian kernel covering ±3σ
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil().max(1.0) as i64;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

fn premultiply(px: [f32; 4]) -> [f32; 4] {
    let a = px[3];
    [px[0] * a, px[1] * a, px[2] * a, a]
}

fn unpremultiply(px: [f32; 4]) -> [f32; 4] {
    let a = px[3].clamp(0.0, 1.0);
    if a <= f32::EPSILON {
        return [0.0; 4];
    }
    [
        (px[0] / a).clamp(0.0, 1.0),
        (px[1] / a).clamp(0.0, 1.0),
        (px[2] / a).clamp(0.0, 1.0),
        a,
    ]
}

fn convolve(
    src: &[[f32; 4]],
    width: usize,
    height: usize,
    kernel: &[f32],
    axis: Axis,
) -> Vec<[f32; 4]> {
    let radius = (kernel.len() / 2) as i64;
    let (w, h) = (width as i64, height as i64);
    let mut out = vec![[0.0f32; 4]; src.len()];

    for (index, slot) in out.iter_mut().enumerate() {
        let x = (index % width) as i64;
        let y = (index / width) as i64;
        let mut acc = [0.0f32; 4];

        for (k, weight) in kernel.iter().enumerate() {
            let offset = k as i64 - radius;
            let (sx, sy) = match axis {
                Axis::Horizontal => (x + offset, y),
                Axis::Vertical => (x, y + offset),
            };
            if sx < 0 || sy < 0 || sx >= w || sy >= h {
                continue;
            }
            if let Some(sample) = src.get((sy * w + sx) as usize) {
                for (a, s) in acc.iter_mut().zip(sample) {
                    *a += s * weight;
                }
            }
        }
        *slot = acc;
    }
    out
}

/// Blur unpremultiplied RGBA pixels with standard deviation `sigma` (pixels)
///
/// Returns unpremultiplied pixels; a non-positive `sigma` returns the input unchanged.
#[must_use]
pub fn gaussian_blur_premultiplied(
    pixels: &[[f32; 4]],
    width: usize,
    height: usize,
    sigma: f32,
) -> Vec<[f32; 4]> {
    if sigma <= 0.0 || width == 0 || height == 0 {
        return pixels.to_vec();
    }

    let kernel = gaussian_kernel(sigma);
    let premultiplied: Vec<[f32; 4]> = pixels.iter().copied().map(premultiply).collect();
    let horizontal = convolve(&premultiplied, width, height, &kernel, Axis::Horizontal);
    convolve(&horizontal, width, height, &kernel, Axis::Vertical)
        .into_iter()
        .map(unpremultiply)
        .collect()
}
