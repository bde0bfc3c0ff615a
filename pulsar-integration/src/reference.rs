//! Sequential reference integration.
//!
//! These functions define the expected result of every generated kernel:
//!
//! `output[.., s] = (input[.., s*F] + ... + input[.., s*F + F - 1]) / F`
//!
//! Sums are accumulated in the element type and divided using its own
//! semantics (truncating for integers). Trailing samples that do not fill a
//! whole window are ignored. Offsets come from [`ModeLayouts`], the same
//! layouts the kernel generator embeds into kernel text.

use pulsar_core::Result;

use crate::layout::{ModeLayouts, Padding};
use crate::mode::IntegrationMode;
use crate::scalar::Sample;
use crate::shape::ObservationShape;

fn layouts_for<T: Sample>(
    mode: IntegrationMode,
    shape: &ObservationShape,
    integration: u32,
    padding: usize,
) -> Result<ModeLayouts> {
    shape.validate()?;
    let padding = Padding::new(padding, core::mem::size_of::<T>());
    ModeLayouts::new(mode, shape, integration, padding)
}

/// Builds the multi-index for `(beam, row, sample)` along the mode's axes.
fn index(reduced_axis: usize, beam: usize, row: usize, sample: usize) -> [usize; 3] {
    if reduced_axis == 1 {
        [beam, sample, row]
    } else {
        [beam, row, sample]
    }
}

fn integrate_out_of_place<T: Sample>(
    layouts: &ModeLayouts,
    integration: u32,
    input: &[T],
    output: &mut [T],
) -> Result<()> {
    layouts.input.check_len(input.len(), "input")?;
    layouts.output.check_len(output.len(), "output")?;

    let axis = layouts.reduced_axis;
    let beams = layouts.input.extent(0);
    let rows = layouts.input.extent(3 - axis);
    let window = integration as usize;

    for beam in 0..beams {
        for row in 0..rows {
            for sample in 0..layouts.nr_integrated_samples() {
                let mut sum = T::default();
                for i in 0..window {
                    let at = layouts
                        .input
                        .offset(&index(axis, beam, row, sample * window + i));
                    sum = sum.accumulate(input[at]);
                }
                let at = layouts.output.offset(&index(axis, beam, row, sample));
                output[at] = T::integrate(sum, integration);
            }
        }
    }
    Ok(())
}

fn integrate_rows_in_place<T: Sample>(
    layouts: &ModeLayouts,
    integration: u32,
    data: &mut [T],
) -> Result<()> {
    layouts.input.check_len(data.len(), "in-place")?;

    let window = integration as usize;
    for beam in 0..layouts.input.extent(0) {
        for row in 0..layouts.input.extent(1) {
            let start = layouts.input.offset(&[beam, row, 0]);
            // Output slot `s` never lies past the start of window `s`, so an
            // ascending sweep reads every window before it is overwritten.
            for sample in 0..layouts.nr_integrated_samples() {
                let window_start = start + sample * window;
                let sum = data[window_start..window_start + window]
                    .iter()
                    .fold(T::default(), |acc, &v| acc.accumulate(v));
                data[start + sample] = T::integrate(sum, integration);
            }
        }
    }
    Ok(())
}

/// Integrates a beam → DM → sample buffer along samples.
pub fn integration_dms_samples<T: Sample>(
    shape: &ObservationShape,
    integration: u32,
    padding: usize,
    input: &[T],
    output: &mut [T],
) -> Result<()> {
    let layouts = layouts_for::<T>(IntegrationMode::DmsSamples, shape, integration, padding)?;
    integrate_out_of_place(&layouts, integration, input, output)
}

/// Integrates a beam → sample → DM buffer along samples.
pub fn integration_samples_dms<T: Sample>(
    shape: &ObservationShape,
    integration: u32,
    padding: usize,
    input: &[T],
    output: &mut [T],
) -> Result<()> {
    let layouts = layouts_for::<T>(IntegrationMode::SamplesDms, shape, integration, padding)?;
    integrate_out_of_place(&layouts, integration, input, output)
}

/// Integrates a beam → channel → sample buffer in place.
///
/// The first `samples / integration` slots of every row receive the result;
/// the remainder of each row is left as it was.
pub fn integration_before_dedispersion_in_place<T: Sample>(
    shape: &ObservationShape,
    integration: u32,
    padding: usize,
    data: &mut [T],
) -> Result<()> {
    let layouts = layouts_for::<T>(
        IntegrationMode::InPlaceBeforeDedispersion,
        shape,
        integration,
        padding,
    )?;
    integrate_rows_in_place(&layouts, integration, data)
}

/// Integrates a beam → DM → sample buffer in place.
pub fn integration_after_dedispersion_in_place<T: Sample>(
    shape: &ObservationShape,
    integration: u32,
    padding: usize,
    data: &mut [T],
) -> Result<()> {
    let layouts = layouts_for::<T>(
        IntegrationMode::InPlaceAfterDedispersion,
        shape,
        integration,
        padding,
    )?;
    integrate_rows_in_place(&layouts, integration, data)
}

/// Runs the reference integration for any mode and returns the result buffer.
///
/// For the out-of-place modes the result is a freshly allocated output
/// buffer; for the in-place modes it is a copy of `input` after integration.
pub fn integrate<T: Sample>(
    mode: IntegrationMode,
    shape: &ObservationShape,
    integration: u32,
    padding: usize,
    input: &[T],
) -> Result<Vec<T>> {
    let layouts = layouts_for::<T>(mode, shape, integration, padding)?;
    if mode.is_in_place() {
        let mut data = input.to_vec();
        integrate_rows_in_place(&layouts, integration, &mut data)?;
        Ok(data)
    } else {
        let mut output = vec![T::default(); layouts.output.len()];
        integrate_out_of_place(&layouts, integration, input, &mut output)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsar_core::PulsarError;

    fn scenario_a_input(shape: &ObservationShape, padding: usize) -> Vec<u32> {
        let layouts = layouts_for::<u32>(IntegrationMode::DmsSamples, shape, 4, padding).unwrap();
        let mut input = vec![0u32; layouts.input.len()];
        for dm in 0..shape.nr_dms() as usize {
            for s in 0..shape.nr_samples_per_batch() as usize {
                input[layouts.input.offset(&[0, dm, s])] = (s % 10) as u32;
            }
        }
        input
    }

    #[test]
    fn test_dms_samples_truncating_average() {
        let shape = ObservationShape::new(4, 16);
        let padding = 32;
        let input = scenario_a_input(&shape, padding);
        let out = integrate(IntegrationMode::DmsSamples, &shape, 4, padding, &input).unwrap();
        let layouts = layouts_for::<u32>(IntegrationMode::DmsSamples, &shape, 4, padding).unwrap();
        for dm in 0..4 {
            let row: Vec<u32> = (0..4)
                .map(|s| out[layouts.output.offset(&[0, dm, s])])
                .collect();
            // windows sum to 6, 22, 18, 14
            assert_eq!(row, vec![1, 5, 4, 3]);
        }
    }

    #[test]
    fn test_samples_dms_reduces_across_rows() {
        let shape = ObservationShape::new(3, 6);
        let padding = 16;
        let layouts = layouts_for::<f32>(IntegrationMode::SamplesDms, &shape, 3, padding).unwrap();
        let mut input = vec![0.0f32; layouts.input.len()];
        for s in 0..6 {
            for dm in 0..3 {
                input[layouts.input.offset(&[0, s, dm])] = (s * 10 + dm) as f32;
            }
        }
        let mut output = vec![0.0f32; layouts.output.len()];
        integration_samples_dms(&shape, 3, padding, &input, &mut output).unwrap();
        // window 0 holds samples 0..3, window 1 holds samples 3..6
        assert_eq!(output[layouts.output.offset(&[0, 0, 0])], 10.0);
        assert_eq!(output[layouts.output.offset(&[0, 0, 2])], 12.0);
        assert_eq!(output[layouts.output.offset(&[0, 1, 1])], 41.0);
    }

    #[test]
    fn test_remainder_samples_are_dropped() {
        let shape = ObservationShape::new(2, 10);
        let padding = 0;
        let mut input = vec![1i32; 20];
        // last two samples of row 0 would poison the result if used
        input[8] = 1000;
        input[9] = 1000;
        let out = integrate(IntegrationMode::DmsSamples, &shape, 4, padding, &input).unwrap();
        assert_eq!(out, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_in_place_compacts_front_of_each_row() {
        let shape = ObservationShape::new(2, 8);
        let padding = 0;
        let mut data: Vec<u16> = (0..16).collect();
        integration_after_dedispersion_in_place(&shape, 2, padding, &mut data).unwrap();
        assert_eq!(&data[0..4], &[0, 2, 4, 6]);
        assert_eq!(&data[4..8], &[4, 5, 6, 7]);
        assert_eq!(&data[8..12], &[8, 10, 12, 14]);
    }

    #[test]
    fn test_in_place_before_dedispersion_uses_channels() {
        let shape = ObservationShape::new(1, 4)
            .with_channels(2)
            .with_dispersed_samples(6);
        let padding = 32;
        let layouts = layouts_for::<f64>(
            IntegrationMode::InPlaceBeforeDedispersion,
            &shape,
            3,
            padding,
        )
        .unwrap();
        let mut data = vec![0.0f64; layouts.input.len()];
        for ch in 0..2 {
            for s in 0..6 {
                data[layouts.input.offset(&[0, ch, s])] = (ch * 100 + s) as f64;
            }
        }
        integration_before_dedispersion_in_place(&shape, 3, padding, &mut data).unwrap();
        assert_eq!(data[layouts.output.offset(&[0, 0, 0])], 1.0);
        assert_eq!(data[layouts.output.offset(&[0, 0, 1])], 4.0);
        assert_eq!(data[layouts.output.offset(&[0, 1, 0])], 101.0);
        assert_eq!(data[layouts.output.offset(&[0, 1, 1])], 104.0);
    }

    #[test]
    fn test_integration_one_is_identity() {
        let shape = ObservationShape::new(2, 5).with_beams(2);
        let input: Vec<i64> = (0..20).collect();
        let out = integrate(IntegrationMode::DmsSamples, &shape, 1, 0, &input).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_short_buffers_are_rejected() {
        let shape = ObservationShape::new(4, 16);
        let input = vec![0u32; 10];
        let err = integrate(IntegrationMode::DmsSamples, &shape, 4, 0, &input).unwrap_err();
        assert!(matches!(err, PulsarError::InvalidInput(_)));

        let input = vec![0u32; 64];
        let mut output = vec![0u32; 3];
        assert!(integration_dms_samples(&shape, 4, 0, &input, &mut output).is_err());
    }

    #[test]
    fn test_zero_integration_is_rejected() {
        let shape = ObservationShape::new(1, 4);
        let mut data = vec![0.0f32; 4];
        assert!(integration_after_dedispersion_in_place(&shape, 0, 0, &mut data).is_err());
    }
}
