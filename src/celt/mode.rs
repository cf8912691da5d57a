//! Band layout shared by every stage of the band pipeline.
//!
//! A [`Mode`] is validated once at construction and never mutated, so the
//! pipeline can size scratch buffers and slice bands from it without further
//! checks. Spectra are interleaved by channel: bin `j` of channel `c` lives at
//! flat index `j * C + c`, and band `i` covers bins
//! `[B * e_bands[i], B * e_bands[i + 1])` where `B` is the block count.

use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use log::debug;

/// Largest supported channel count.
pub const MAX_CHANNELS: usize = 2;
/// Largest supported number of MDCT blocks per frame.
pub const MAX_BLOCKS: usize = 8;
/// Largest number of samples one channel may have in a single band.
pub const MAX_BAND_SAMPLES: usize = 256;
/// Upper bound on the lags searched by intra-frame prediction.
pub const MAX_INTRA_LAGS: usize = 32;

/// Critical band edges in Hz.
const BARK_FREQ: [u32; 26] = [
    0, 100, 200, 300, 400, 510, 630, 770, 920, 1080, 1270, 1480, 1720, 2000, 2320, 2700, 3150,
    3700, 4400, 5300, 6400, 7700, 9500, 12000, 15500, 20000,
];
/// Pitch band edges in Hz.
const PITCH_FREQ: [u32; 9] = [0, 345, 689, 1034, 1378, 2067, 3273, 5340, 6374];
/// Narrowest band width in bins for the linear low-frequency region.
const MIN_BINS: usize = 3;

/// Reasons a band layout is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    /// Fewer than one coded band (the table needs at least three entries).
    TooFewBands,
    /// A boundary table does not start at bin zero.
    NonZeroStart(&'static str),
    /// A boundary table is not strictly increasing at `index`.
    Unsorted { table: &'static str, index: usize },
    /// The pitch bands do not end where the energy bands end.
    PitchBandsMismatch { pitch_end_bin: usize, band_end_bin: usize },
    /// `pitch_end` lies beyond the coded spectrum.
    PitchEndOutOfRange(usize),
    UnsupportedChannels(usize),
    UnsupportedBlocks(usize),
    /// A band holds fewer than two interleaved samples.
    BandTooNarrow(usize),
    /// A band holds more than [`MAX_BAND_SAMPLES`] samples per channel.
    BandTooWide(usize),
    /// No band layout can be derived for this sample rate and frame size.
    UnsupportedLayout { sample_rate: u32, frame_size: usize },
}

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewBands => f.write_str("band table must describe at least one coded band"),
            Self::NonZeroStart(table) => write!(f, "{table} must start at bin 0"),
            Self::Unsorted { table, index } => {
                write!(f, "{table} is not strictly increasing at index {index}")
            }
            Self::PitchBandsMismatch {
                pitch_end_bin,
                band_end_bin,
            } => write!(
                f,
                "pitch bands end at bin {pitch_end_bin} but energy bands end at bin {band_end_bin}"
            ),
            Self::PitchEndOutOfRange(bin) => {
                write!(f, "pitch cutoff {bin} lies beyond the coded spectrum")
            }
            Self::UnsupportedChannels(channels) => {
                write!(f, "unsupported channel count: {channels}")
            }
            Self::UnsupportedBlocks(blocks) => write!(f, "unsupported block count: {blocks}"),
            Self::BandTooNarrow(band) => write!(f, "band {band} holds fewer than two samples"),
            Self::BandTooWide(band) => {
                write!(f, "band {band} exceeds {MAX_BAND_SAMPLES} samples per channel")
            }
            Self::UnsupportedLayout {
                sample_rate,
                frame_size,
            } => write!(
                f,
                "no band layout for {sample_rate} Hz with {frame_size} bins per block"
            ),
        }
    }
}

impl core::error::Error for ModeError {}

/// Immutable band configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
    e_bands: Vec<usize>,
    p_bands: Vec<usize>,
    blocks: usize,
    channels: usize,
    pitch_end: usize,
}

impl Mode {
    /// Validates explicit boundary tables.
    ///
    /// `e_bands` holds `nb_ebands + 2` bin indices: the band edges, then the
    /// end of the coded spectrum, then the end of the buffer. `p_bands` holds
    /// `nb_pbands + 2` pitch band edges and must end where `e_bands` ends.
    /// Bands starting at or above the `pitch_end` bin never use the pitch
    /// reference.
    pub fn new(
        e_bands: &[usize],
        p_bands: &[usize],
        blocks: usize,
        channels: usize,
        pitch_end: usize,
    ) -> Result<Self, ModeError> {
        let mode = Self {
            e_bands: e_bands.to_vec(),
            p_bands: p_bands.to_vec(),
            blocks,
            channels,
            pitch_end,
        };
        if let Err(err) = mode.validate() {
            debug!("Mode::new: rejecting layout: {err}");
            return Err(err);
        }
        Ok(mode)
    }

    /// Derives a Bark-spaced layout for `frame_size` bins per block.
    ///
    /// Low frequencies get linear bands of three bins until the critical
    /// bands grow wider than that; pitch bands are snapped onto band edges.
    pub fn create(
        sample_rate: u32,
        channels: usize,
        frame_size: usize,
        blocks: usize,
    ) -> Result<Self, ModeError> {
        let unsupported = ModeError::UnsupportedLayout {
            sample_rate,
            frame_size,
        };
        if frame_size < 2 * MIN_BINS || sample_rate < 2 * frame_size as u32 {
            return Err(unsupported);
        }

        let res = ((sample_rate as usize + frame_size) / (2 * frame_size)).max(1);
        let e_bands = compute_ebands(res, frame_size);
        if e_bands.len() < 3 {
            return Err(unsupported);
        }
        let p_bands = compute_pbands(res, &e_bands);
        let pitch_end = p_bands[p_bands.len() - 2];
        Self::new(&e_bands, &p_bands, blocks, channels, pitch_end)
    }

    fn validate(&self) -> Result<(), ModeError> {
        if self.e_bands.len() < 3 {
            return Err(ModeError::TooFewBands);
        }
        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            return Err(ModeError::UnsupportedChannels(self.channels));
        }
        if !(1..=MAX_BLOCKS).contains(&self.blocks) {
            return Err(ModeError::UnsupportedBlocks(self.blocks));
        }
        check_table("e_bands", &self.e_bands)?;
        if self.p_bands.len() < 2 {
            return Err(ModeError::TooFewBands);
        }
        check_table("p_bands", &self.p_bands)?;

        let band_end_bin = self.e_bands[self.e_bands.len() - 1];
        let pitch_end_bin = self.p_bands[self.p_bands.len() - 1];
        if pitch_end_bin != band_end_bin {
            return Err(ModeError::PitchBandsMismatch {
                pitch_end_bin,
                band_end_bin,
            });
        }
        if self.pitch_end > self.e_bands[self.nb_ebands()] {
            return Err(ModeError::PitchEndOutOfRange(self.pitch_end));
        }

        for band in 0..self.nb_ebands() {
            let width = self.e_bands[band + 1] - self.e_bands[band];
            if self.stride() * width < 2 {
                return Err(ModeError::BandTooNarrow(band));
            }
            if self.blocks * width > MAX_BAND_SAMPLES {
                return Err(ModeError::BandTooWide(band));
            }
        }
        Ok(())
    }

    /// Number of coded bands.
    #[must_use]
    pub fn nb_ebands(&self) -> usize {
        self.e_bands.len() - 2
    }

    /// Number of pitch bands.
    #[must_use]
    pub fn nb_pbands(&self) -> usize {
        self.p_bands.len() - 2
    }

    #[must_use]
    pub fn e_bands(&self) -> &[usize] {
        &self.e_bands
    }

    #[must_use]
    pub fn p_bands(&self) -> &[usize] {
        &self.p_bands
    }

    #[must_use]
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// First bin that never uses inter-frame pitch prediction.
    #[must_use]
    pub fn pitch_end(&self) -> usize {
        self.pitch_end
    }

    /// Interleaved samples per bin (`B * C`).
    #[must_use]
    pub fn stride(&self) -> usize {
        self.blocks * self.channels
    }

    /// Length of a full spectral buffer.
    #[must_use]
    pub fn spectrum_len(&self) -> usize {
        self.stride() * self.e_bands[self.nb_ebands() + 1]
    }

    /// Number of energy bank entries (`nb_ebands * C`).
    #[must_use]
    pub fn bank_len(&self) -> usize {
        self.nb_ebands() * self.channels
    }

    /// Flat sample range of `band`, all channels and blocks included.
    #[must_use]
    pub fn band_range(&self, band: usize) -> Range<usize> {
        self.stride() * self.e_bands[band]..self.stride() * self.e_bands[band + 1]
    }

    /// Flat range between the last coded band and the end of the buffer.
    #[must_use]
    pub fn tail_range(&self) -> Range<usize> {
        self.band_range(self.nb_ebands())
    }

    /// Flat sample range of pitch band `band`.
    #[must_use]
    pub fn pitch_band_range(&self, band: usize) -> Range<usize> {
        self.stride() * self.p_bands[band]..self.stride() * self.p_bands[band + 1]
    }

    /// Flat range after the last pitch band.
    #[must_use]
    pub fn pitch_tail_range(&self) -> Range<usize> {
        self.pitch_band_range(self.nb_pbands())
    }

    /// Whether `band` starts at or above the pitch cutoff.
    #[must_use]
    pub fn is_above_pitch_end(&self, band: usize) -> bool {
        self.e_bands[band] >= self.pitch_end
    }

    /// Number of history lags intra-frame prediction may search for `band`.
    #[must_use]
    pub fn intra_lags(&self, band: usize) -> usize {
        let width = self.e_bands[band + 1] - self.e_bands[band];
        self.e_bands[band].saturating_sub(width).min(MAX_INTRA_LAGS)
    }

    /// Index of the bank entry for (`band`, `channel`).
    #[must_use]
    pub fn bank_index(&self, band: usize, channel: usize) -> usize {
        band * self.channels + channel
    }

    /// Read-only view of one channel of `band` in an interleaved spectrum.
    #[must_use]
    pub fn channel_band<'a, T>(&self, x: &'a [T], band: usize, channel: usize) -> ChannelBand<'a, T> {
        ChannelBand {
            samples: &x[self.band_range(band)],
            channel,
            channels: self.channels,
        }
    }

    /// Mutable view of one channel of `band` in an interleaved spectrum.
    #[must_use]
    pub fn channel_band_mut<'a, T>(
        &self,
        x: &'a mut [T],
        band: usize,
        channel: usize,
    ) -> ChannelBandMut<'a, T> {
        ChannelBandMut {
            samples: &mut x[self.band_range(band)],
            channel,
            channels: self.channels,
        }
    }
}

fn check_table(table: &'static str, edges: &[usize]) -> Result<(), ModeError> {
    if edges[0] != 0 {
        return Err(ModeError::NonZeroStart(table));
    }
    // The final entry may coincide with the end of the coded spectrum.
    let last = edges.len() - 1;
    for index in 1..edges.len() {
        let ordered = if index == last {
            edges[index] >= edges[index - 1]
        } else {
            edges[index] > edges[index - 1]
        };
        if !ordered {
            return Err(ModeError::Unsorted { table, index });
        }
    }
    Ok(())
}

fn compute_ebands(res: usize, frame_size: usize) -> Vec<usize> {
    let min_width = MIN_BINS * res;
    let lin = (0..BARK_FREQ.len() - 1)
        .find(|&i| (BARK_FREQ[i + 1] - BARK_FREQ[i]) as usize >= min_width)
        .unwrap_or(BARK_FREQ.len() - 1);
    let top = ((BARK_FREQ[BARK_FREQ.len() - 1] as usize + res / 2) / res).min(frame_size);

    let low = (BARK_FREQ[lin] as usize / res).div_ceil(MIN_BINS);
    let linear = (0..low).map(|i| MIN_BINS * i);
    let critical = (lin..BARK_FREQ.len() - 1)
        .enumerate()
        .map(|(i, bark)| ((BARK_FREQ[bark] as usize + res / 2) / res).max(MIN_BINS * (low + i)));

    let mut edges: Vec<usize> = Vec::with_capacity(BARK_FREQ.len() + low + 2);
    for edge in linear.chain(critical) {
        if edge >= top {
            break;
        }
        if edges.last().is_none_or(|&prev| edge > prev) {
            edges.push(edge);
        }
    }
    edges.push(top);
    edges.push(frame_size);
    edges
}

fn compute_pbands(res: usize, e_bands: &[usize]) -> Vec<usize> {
    let nb = e_bands.len() - 2;
    let coded_end = e_bands[nb];

    let mut edges: Vec<usize> = Vec::with_capacity(PITCH_FREQ.len() + 1);
    edges.push(0);
    for &freq in &PITCH_FREQ[1..] {
        let target = ((freq as usize + res / 2) / res).min(coded_end);
        // Snap onto the nearer band edge, never back onto the previous pitch edge.
        let j = (0..nb)
            .find(|&j| e_bands[j] <= target && e_bands[j + 1] > target)
            .unwrap_or(nb);
        let lower = e_bands[j];
        let upper = e_bands[(j + 1).min(nb)];
        let prev = edges[edges.len() - 1];
        let snapped = if lower == target || (target - lower < upper - target && lower != prev) {
            lower
        } else {
            upper
        };
        if snapped > prev {
            edges.push(snapped);
        }
    }
    edges.push(e_bands[nb + 1]);
    edges
}

/// One channel of one band inside an interleaved spectrum.
#[derive(Debug, Clone, Copy)]
pub struct ChannelBand<'a, T> {
    samples: &'a [T],
    channel: usize,
    channels: usize,
}

impl<'a, T: Copy> ChannelBand<'a, T> {
    /// Samples of this channel in bin order.
    pub fn iter(&self) -> impl Iterator<Item = T> + Clone + 'a {
        let samples: &'a [T] = self.samples;
        samples[self.channel..].iter().copied().step_by(self.channels)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Mutable counterpart of [`ChannelBand`].
#[derive(Debug)]
pub struct ChannelBandMut<'a, T> {
    samples: &'a mut [T],
    channel: usize,
    channels: usize,
}

impl<T> ChannelBandMut<'_, T> {
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.samples[self.channel..].iter_mut().step_by(self.channels)
    }
}
