//! Scalar features over the byte buffers handed to callbacks. Every
//! function returns a value in `[0, 1]` and treats an empty buffer as
//! silence.

/// Mean value normalized against the buffer's own min/max range.
pub fn average(data: &[u8]) -> f32 {
    let (Some(min), Some(max)) = (data.iter().min(), data.iter().max()) else {
        return 0.0;
    };
    if max <= min {
        return 0.0;
    }
    let sum: u32 = data.iter().map(|value| u32::from(*value)).sum();
    let mean = sum as f32 / data.len() as f32;
    (mean - f32::from(*min)) / f32::from(max - min)
}

pub fn peak(data: &[u8]) -> f32 {
    data.iter().copied().max().map(|max| f32::from(max) / 255.0).unwrap_or(0.0)
}

/// Root mean square of the normalized values.
pub fn rms(data: &[u8]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: f32 = data
        .iter()
        .map(|value| {
            let norm = f32::from(*value) / 255.0;
            norm * norm
        })
        .sum();
    (sum / data.len() as f32).sqrt()
}

/// Mean energy of bins `start..end`, clipped to the buffer.
pub fn band_energy(data: &[u8], start: usize, end: usize) -> f32 {
    let end = end.min(data.len());
    if start >= end {
        return 0.0;
    }
    let band = &data[start..end];
    let sum: u32 = band.iter().map(|value| u32::from(*value)).sum();
    sum as f32 / band.len() as f32 / 255.0
}

/// Lowest tenth of the spectrum.
pub fn bass_energy(data: &[u8]) -> f32 {
    band_energy(data, 0, data.len() / 10)
}

/// 10% to 50% of the spectrum.
pub fn mid_energy(data: &[u8]) -> f32 {
    band_energy(data, data.len() / 10, data.len() / 2)
}

/// 50% to 90% of the spectrum.
pub fn treble_energy(data: &[u8]) -> f32 {
    band_energy(data, data.len() / 2, data.len() * 9 / 10)
}

/// Spectral centre of mass as a fraction of the buffer length.
pub fn centroid(data: &[u8]) -> f32 {
    let (weighted, total) = data
        .iter()
        .enumerate()
        .fold((0.0_f64, 0.0_f64), |(weighted, total), (index, value)| {
            let amplitude = f64::from(*value);
            (weighted + index as f64 * amplitude, total + amplitude)
        });
    if total == 0.0 {
        0.0
    } else {
        (weighted / total / data.len() as f64) as f32
    }
}

pub fn dynamic_range(data: &[u8]) -> f32 {
    match (data.iter().min(), data.iter().max()) {
        (Some(min), Some(max)) => f32::from(max - min) / 255.0,
        _ => 0.0,
    }
}
