//! Test-signal generators and measurements

use std::f64::consts::PI;

/// Sine wave with the given amplitude
pub fn sine(frequency: f64, amplitude: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| (amplitude * (2.0 * PI * frequency * i as f64 / sample_rate).sin()) as f32)
        .collect()
}

/// Unit impulse followed by silence
pub fn impulse(num_samples: usize) -> Vec<f32> {
    let mut signal = vec![0.0; num_samples];
    if let Some(first) = signal.first_mut() {
        *first = 1.0;
    }
    signal
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

pub fn all_finite(samples: &[f32]) -> bool {
    samples.iter().all(|s| s.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_measurements() {
        let signal = sine(1000.0, 0.5, 48000.0, 4800);
        assert!((peak(&signal) - 0.5).abs() < 1e-3);
        assert!((rms(&signal) - 0.5 / 2f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_impulse() {
        let signal = impulse(4);
        assert_eq!(signal, vec![1.0, 0.0, 0.0, 0.0]);
        assert!(impulse(0).is_empty());
        assert_eq!(rms(&[]), 0.0);
    }
}
