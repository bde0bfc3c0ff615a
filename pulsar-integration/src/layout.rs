//! Padded buffer layouts and flat offset arithmetic.
//!
//! Every buffer handled by the integration kernels is a dense row-major array
//! whose innermost dimension is padded to a device alignment. The same
//! [`Layout`] value is used by the reference reducer, the kernel renderer, and
//! the simulator, so all three agree on every offset.

use pulsar_core::{PulsarError, Result};

use crate::mode::IntegrationMode;
use crate::shape::ObservationShape;

/// Rounds `value` up to the next multiple of `multiple`.
///
/// A `multiple` of zero means "no alignment" and returns `value` unchanged.
pub fn pad(value: usize, multiple: usize) -> usize {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

/// Device alignment expressed in bytes, paired with the element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Padding {
    bytes: usize,
    element_size: usize,
}

impl Padding {
    /// Creates a padding description for elements of `element_size` bytes.
    pub fn new(bytes: usize, element_size: usize) -> Self {
        Self {
            bytes,
            element_size,
        }
    }

    /// Alignment in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Element size in bytes.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Alignment in elements (`bytes / element_size`).
    pub fn elements(&self) -> usize {
        if self.element_size == 0 {
            0
        } else {
            self.bytes / self.element_size
        }
    }

    /// Padded size of a dimension with `extent` elements.
    pub fn padded(&self, extent: usize) -> usize {
        pad(extent, self.elements())
    }
}

/// A dense N-dimensional layout: logical extents plus element strides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    extents: Vec<usize>,
    strides: Vec<usize>,
    len: usize,
}

impl Layout {
    /// Builds a row-major layout whose innermost dimension is padded.
    ///
    /// The stride of each dimension is the product of the (padded) extents of
    /// all inner dimensions.
    pub fn padded(extents: &[usize], padding: Padding) -> Self {
        let mut stored = extents.to_vec();
        if let Some(inner) = stored.last_mut() {
            *inner = padding.padded(*inner);
        }
        let mut strides = vec![1; stored.len()];
        for dim in (0..stored.len().saturating_sub(1)).rev() {
            strides[dim] = strides[dim + 1] * stored[dim + 1];
        }
        let len = stored.iter().product();
        Self {
            extents: extents.to_vec(),
            strides,
            len,
        }
    }

    /// Returns a layout with the same strides but a different logical extent
    /// along `dim`. The allocation length is left unchanged.
    ///
    /// This is how the in-place variants describe the compacted output that
    /// lives at the front of each input row.
    pub fn with_extent(&self, dim: usize, extent: usize) -> Self {
        let mut extents = self.extents.clone();
        extents[dim] = extent;
        Self {
            extents,
            strides: self.strides.clone(),
            len: self.len,
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.extents.len()
    }

    /// Logical extents (unpadded).
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Logical extent of one dimension.
    pub fn extent(&self, dim: usize) -> usize {
        self.extents[dim]
    }

    /// Element strides, outermost first.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Element stride of one dimension.
    pub fn stride(&self, dim: usize) -> usize {
        self.strides[dim]
    }

    /// Number of elements a buffer must hold for this layout.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the layout holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flat offset of a multi-index: `sum(index[d] * stride[d])`.
    pub fn offset(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.strides.len());
        index
            .iter()
            .zip(&self.strides)
            .map(|(i, stride)| i * stride)
            .sum()
    }

    /// Returns an error unless a buffer of `len` elements can hold this layout.
    pub fn check_len(&self, len: usize, what: &str) -> Result<()> {
        if len < self.len {
            return Err(PulsarError::InvalidInput(format!(
                "{what} buffer holds {len} elements, layout requires {}",
                self.len
            )));
        }
        Ok(())
    }
}

/// Input and output layouts of one integration mode.
///
/// All layouts are three-dimensional: `[beam, row, sample]` for the
/// DMs-major and in-place modes, `[beam, sample, dm]` for samples-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeLayouts {
    /// Layout of the input (or in-place) buffer.
    pub input: Layout,
    /// Layout of the integrated result.
    pub output: Layout,
    /// Index of the dimension being integrated.
    pub reduced_axis: usize,
}

impl ModeLayouts {
    /// Computes the layouts for `mode` over `shape`.
    ///
    /// The output extent along the reduced axis is `floor(samples / integration)`;
    /// trailing samples that do not fill a whole window are not represented.
    pub fn new(
        mode: IntegrationMode,
        shape: &ObservationShape,
        integration: u32,
        padding: Padding,
    ) -> Result<Self> {
        if integration == 0 {
            return Err(PulsarError::InvalidInput(
                "integration factor must be positive".to_string(),
            ));
        }
        let beams = mode.nr_beams(shape) as usize;
        let rows = mode.nr_rows(shape) as usize;
        let samples = mode.nr_samples(shape) as usize;
        let integrated = samples / integration as usize;

        let layouts = match mode {
            IntegrationMode::DmsSamples => Self {
                input: Layout::padded(&[beams, rows, samples], padding),
                output: Layout::padded(&[beams, rows, integrated], padding),
                reduced_axis: 2,
            },
            IntegrationMode::SamplesDms => Self {
                input: Layout::padded(&[beams, samples, rows], padding),
                output: Layout::padded(&[beams, integrated, rows], padding),
                reduced_axis: 1,
            },
            IntegrationMode::InPlaceBeforeDedispersion
            | IntegrationMode::InPlaceAfterDedispersion => {
                let input = Layout::padded(&[beams, rows, samples], padding);
                let output = input.with_extent(2, integrated);
                Self {
                    input,
                    output,
                    reduced_axis: 2,
                }
            }
        };
        Ok(layouts)
    }

    /// Number of output samples per row.
    pub fn nr_integrated_samples(&self) -> usize {
        self.output.extent(self.reduced_axis)
    }
}
