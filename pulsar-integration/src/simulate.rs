//! Host execution of generated kernels.
//!
//! The simulator walks the NDRange of an [`IntegrationKernel`] group by group
//! and runs each group's work-items in lockstep between barriers, using the
//! same geometry, offsets and store arithmetic baked into the kernel text.
//! It lets the algorithm of a configuration be checked against the
//! [`reference`](crate::reference) reducer without an OpenCL device.

use pulsar_core::{PulsarError, Result};

use crate::opencl::{IntegrationKernel, KernelGeometry};
use crate::mode::IntegrationMode;
use crate::scalar::Sample;

fn check_element<T: Sample>(g: &KernelGeometry) -> Result<()> {
    let size = core::mem::size_of::<T>();
    if g.scalar.size_bytes() != size {
        return Err(PulsarError::InvalidInput(format!(
            "kernel was generated for {} ({} bytes), buffer elements are {} bytes",
            g.scalar,
            g.scalar.size_bytes(),
            size
        )));
    }
    Ok(())
}

/// Rejects geometries whose NDRange cannot be walked: empty work-groups, and
/// samples-major row counts the work-groups do not cover exactly.
fn check_geometry(g: &KernelGeometry) -> Result<()> {
    if g.nr_threads == 0 || g.nr_items == 0 {
        return Err(PulsarError::InvalidInput(format!(
            "threads ({}) and items ({}) per work-item must be positive",
            g.nr_threads, g.nr_items
        )));
    }
    if g.mode == IntegrationMode::SamplesDms {
        let per_group = u64::from(g.nr_threads) * u64::from(g.nr_items);
        if g.nr_rows as u64 % per_group != 0 {
            return Err(PulsarError::InvalidInput(format!(
                "{} DMs are not divisible by {} threads x {} items",
                g.nr_rows, g.nr_threads, g.nr_items
            )));
        }
    }
    Ok(())
}

/// Executes an out-of-place kernel (`DmsSamples` or `SamplesDms`).
pub fn execute<T: Sample>(kernel: &IntegrationKernel, input: &[T], output: &mut [T]) -> Result<()> {
    let g = kernel.geometry();
    check_element::<T>(g)?;
    check_geometry(g)?;
    g.layouts.input.check_len(input.len(), "input")?;
    g.layouts.output.check_len(output.len(), "output")?;
    match g.mode {
        IntegrationMode::DmsSamples => dms_samples(g, kernel, input, output),
        IntegrationMode::SamplesDms => samples_dms(g, kernel, input, output),
        mode => {
            return Err(PulsarError::InvalidInput(format!(
                "{mode} kernels integrate in place"
            )))
        }
    }
    Ok(())
}

/// Executes an in-place kernel over `data`.
pub fn execute_in_place<T: Sample>(kernel: &IntegrationKernel, data: &mut [T]) -> Result<()> {
    let g = kernel.geometry();
    check_element::<T>(g)?;
    if !g.mode.is_in_place() {
        return Err(PulsarError::InvalidInput(format!(
            "{} kernels need separate input and output buffers",
            g.mode
        )));
    }
    check_geometry(g)?;
    g.layouts.input.check_len(data.len(), "in-place")?;
    in_place(g, kernel, data);
    Ok(())
}

fn dms_samples<T: Sample>(
    g: &KernelGeometry,
    kernel: &IntegrationKernel,
    input: &[T],
    output: &mut [T],
) {
    let threads = g.nr_threads as usize;
    let items = g.nr_items as usize;
    let f = g.integration as usize;
    let [groups, rows, beams] = kernel.work_size().nr_groups();
    let (inp, out) = (&g.layouts.input, &g.layouts.output);
    let mut buffer = vec![T::default(); threads * items];

    for beam in 0..beams {
        for dm in 0..rows {
            for group in 0..groups {
                let base = beam * inp.stride(0) + dm * inp.stride(1) + group * f * items;
                for lid in 0..threads {
                    for k in 0..items {
                        let mut acc = T::default();
                        let mut sample = lid;
                        while sample < f {
                            acc = acc.accumulate(input[base + sample + k * f]);
                            sample += threads;
                        }
                        buffer[lid + k * threads] = acc;
                    }
                }
                // barrier
                let mut threshold = threads / 2;
                while threshold > 0 {
                    for lid in 0..threshold {
                        for k in 0..items {
                            let at = lid + k * threads;
                            buffer[at] = buffer[at].accumulate(buffer[at + threshold]);
                        }
                    }
                    threshold /= 2;
                }
                let base = beam * out.stride(0) + dm * out.stride(1) + group * items;
                for lid in 0..threads.min(items) {
                    output[base + lid] = T::scale(buffer[lid * threads], g.integration);
                }
            }
        }
    }
}

fn samples_dms<T: Sample>(
    g: &KernelGeometry,
    kernel: &IntegrationKernel,
    input: &[T],
    output: &mut [T],
) {
    let threads = g.nr_threads as usize;
    let items = g.nr_items as usize;
    let f = g.integration as usize;
    let [dm_groups, samples, beams] = kernel.work_size().nr_groups();
    let (inp, out) = (&g.layouts.input, &g.layouts.output);

    for beam in 0..beams {
        for out_sample in 0..samples {
            let first = out_sample * f;
            for group in 0..dm_groups {
                for lid in 0..threads {
                    let dm = group * threads * items + lid;
                    for k in 0..items {
                        let mut acc = T::default();
                        for sample in first..first + f {
                            acc = acc.accumulate(
                                input[beam * inp.stride(0) + sample * inp.stride(1) + dm + k * threads],
                            );
                        }
                        output[beam * out.stride(0) + out_sample * out.stride(1) + dm + k * threads] =
                            T::scale(acc, g.integration);
                    }
                }
            }
        }
    }
}

fn in_place<T: Sample>(g: &KernelGeometry, kernel: &IntegrationKernel, data: &mut [T]) {
    let threads = g.nr_threads as usize;
    let items = g.nr_items as usize;
    let f = g.integration as usize;
    let chunk_len = g.chunk_len();
    let [_, rows, beams] = kernel.work_size().nr_groups();
    let layout = &g.layouts.input;
    let mut buffer = vec![T::default(); chunk_len];

    for beam in 0..beams {
        for row in 0..rows {
            let base = beam * layout.stride(0) + row * layout.stride(1);
            let mut chunk = 0;
            while chunk < g.nr_samples {
                for (i, slot) in buffer.iter_mut().enumerate() {
                    *slot = if chunk + i < g.nr_samples {
                        data[base + chunk + i]
                    } else {
                        T::default()
                    };
                }
                // barrier
                for lid in 0..threads {
                    for k in 0..items {
                        let start = lid * f + k * threads * f;
                        let acc = buffer[start..start + f]
                            .iter()
                            .fold(T::default(), |acc, &v| acc.accumulate(v));
                        let at = chunk / f + lid + k * threads;
                        if at < g.nr_integrated_samples {
                            data[base + at] = T::scale(acc, g.integration);
                        }
                    }
                }
                chunk += chunk_len;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::IntegrationConf;
    use crate::opencl::generate;
    use crate::scalar::ScalarType;
    use crate::shape::ObservationShape;

    fn kernel<T: Sample>(
        mode: IntegrationMode,
        shape: &ObservationShape,
        threads: u32,
        items: u32,
        f: u32,
    ) -> IntegrationKernel {
        generate(
            mode,
            &IntegrationConf::new(threads, items),
            shape,
            &ScalarType::of::<T>(),
            f,
            32,
        )
        .unwrap()
    }

    #[test]
    fn test_all_ones_integrate_to_one() {
        let shape = ObservationShape::new(2, 64);
        let k = kernel::<f32>(IntegrationMode::DmsSamples, &shape, 4, 2, 8);
        let g = k.geometry();
        let input = vec![1.0f32; g.layouts.input.len()];
        let mut output = vec![0.0f32; g.layouts.output.len()];
        execute(&k, &input, &mut output).unwrap();
        for dm in 0..2 {
            for s in 0..8 {
                assert_eq!(output[g.layouts.output.offset(&[0, dm, s])], 1.0);
            }
        }
    }

    #[test]
    fn test_all_ones_in_place_integrate_to_one() {
        let shape = ObservationShape::new(3, 100);
        let k = kernel::<f32>(IntegrationMode::InPlaceAfterDedispersion, &shape, 4, 2, 8);
        let g = k.geometry();
        let mut data = vec![1.0f32; g.layouts.input.len()];
        execute_in_place(&k, &mut data).unwrap();
        assert!(data.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_samples_dms_matches_hand_computation() {
        let shape = ObservationShape::new(4, 8);
        let k = kernel::<u32>(IntegrationMode::SamplesDms, &shape, 2, 2, 4);
        let g = k.geometry();
        let mut input = vec![0u32; g.layouts.input.len()];
        for s in 0..8 {
            for dm in 0..4 {
                input[g.layouts.input.offset(&[0, s, dm])] = (s * 10 + dm) as u32;
            }
        }
        let mut output = vec![0u32; g.layouts.output.len()];
        execute(&k, &input, &mut output).unwrap();
        // window 0 of dm 1 sums 1 + 11 + 21 + 31
        assert_eq!(output[g.layouts.output.offset(&[0, 0, 1])], 16);
        assert_eq!(output[g.layouts.output.offset(&[0, 1, 3])], 58);
    }

    #[test]
    fn test_non_power_of_two_threads_lose_partials() {
        let shape = ObservationShape::new(1, 6);
        let k = kernel::<f32>(IntegrationMode::DmsSamples, &shape, 3, 1, 6);
        let g = k.geometry();
        let input = vec![1.0f32; g.layouts.input.len()];
        let mut output = vec![0.0f32; g.layouts.output.len()];
        execute(&k, &input, &mut output).unwrap();
        assert!(output[0] < 1.0);
        assert!(IntegrationConf::new(3, 1)
            .validate_for(IntegrationMode::DmsSamples, &shape, 6)
            .is_err());
    }

    #[test]
    fn test_element_size_must_match() {
        let shape = ObservationShape::new(2, 64);
        let k = kernel::<f32>(IntegrationMode::DmsSamples, &shape, 4, 1, 4);
        let g = k.geometry();
        let input = vec![1.0f64; g.layouts.input.len()];
        let mut output = vec![0.0f64; g.layouts.output.len()];
        assert!(matches!(
            execute(&k, &input, &mut output),
            Err(PulsarError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_entry_point_must_match_mode() {
        let shape = ObservationShape::new(2, 64);
        let oop = kernel::<u32>(IntegrationMode::DmsSamples, &shape, 4, 1, 4);
        let mut data = vec![0u32; oop.geometry().layouts.input.len()];
        assert!(execute_in_place(&oop, &mut data).is_err());

        let ip = kernel::<u32>(IntegrationMode::InPlaceAfterDedispersion, &shape, 4, 1, 4);
        let mut out = data.clone();
        assert!(execute(&ip, &data, &mut out).is_err());
    }

    #[test]
    fn test_short_buffers_are_rejected() {
        let shape = ObservationShape::new(2, 64);
        let k = kernel::<u32>(IntegrationMode::DmsSamples, &shape, 4, 1, 4);
        let input = vec![0u32; 10];
        let mut output = vec![0u32; k.geometry().layouts.output.len()];
        assert!(execute(&k, &input, &mut output).is_err());
    }

    #[test]
    fn test_empty_work_group_is_rejected() {
        let shape = ObservationShape::new(1, 16);
        let k = generate(
            IntegrationMode::InPlaceAfterDedispersion,
            &IntegrationConf::new(0, 1),
            &shape,
            &ScalarType::of::<f32>(),
            4,
            0,
        )
        .unwrap();
        let mut data = vec![1.0f32; k.geometry().layouts.input.len()];
        assert!(matches!(
            execute_in_place(&k, &mut data),
            Err(PulsarError::InvalidInput(_))
        ));

        let k = kernel::<u32>(IntegrationMode::DmsSamples, &shape, 4, 0, 4);
        let input = vec![1u32; k.geometry().layouts.input.len()];
        let mut output = vec![0u32; k.geometry().layouts.output.len()];
        assert!(matches!(
            execute(&k, &input, &mut output),
            Err(PulsarError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_uncovered_samples_dms_rows_are_rejected() {
        let shape = ObservationShape::new(10, 64);
        let k = kernel::<u32>(IntegrationMode::SamplesDms, &shape, 4, 1, 4);
        let input = vec![1u32; k.geometry().layouts.input.len()];
        let mut output = vec![0u32; k.geometry().layouts.output.len()];
        let err = execute(&k, &input, &mut output).unwrap_err();
        assert!(err.to_string().contains("10 DMs"));
        assert!(output.iter().all(|&v| v == 0));
    }
}
