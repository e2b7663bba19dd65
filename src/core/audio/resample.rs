//! Streaming linear-interpolation resampler.
//!
//! Converting a continuous stream one frame at a time needs the trailing
//! samples and the fractional phase of the previous call, otherwise every
//! frame boundary introduces a click and the output length drifts. That
//! history lives in [`ResampleState`], which callers thread through successive
//! calls on the same stream: pass `ResampleState::default()` first, then
//! forward the returned state every time.

/// Continuity state for one resampled stream.
///
/// Owned by exactly one pipeline direction; never share it between streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResampleState {
    /// Rates (after gcd reduction) this state was built for.
    rates: Option<(i64, i64)>,
    /// Phase accumulator. Negative means another input sample is needed.
    phase: i64,
    prev: i16,
    cur: i16,
}

impl ResampleState {
    /// Whether this state carries history from a previous call.
    pub fn is_primed(&self) -> bool {
        self.rates.is_some()
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Resample `input` from `in_rate` to `out_rate`.
///
/// Returns the converted samples and the state to pass to the next call.
/// Matching rates are a no-op and hand back the state untouched. The output
/// length is `round(input.len() * out_rate / in_rate)` within one sample, and
/// the rounding remainder is carried forward so consecutive calls do not drift.
pub fn resample(
    input: &[i16],
    in_rate: u32,
    out_rate: u32,
    state: ResampleState,
) -> (Vec<i16>, ResampleState) {
    if in_rate == out_rate || in_rate == 0 || out_rate == 0 {
        return (input.to_vec(), state);
    }

    let divisor = gcd(in_rate, out_rate);
    let in_step = (in_rate / divisor) as i64;
    let out_step = (out_rate / divisor) as i64;

    // A state built for different rates carries meaningless history.
    let mut state = match state.rates {
        Some(rates) if rates == (in_step, out_step) => state,
        _ => ResampleState {
            rates: Some((in_step, out_step)),
            // Half an input step of lead rounds the output count to nearest.
            phase: -((in_step + 1) / 2),
            prev: 0,
            cur: 0,
        },
    };

    let capacity = (input.len() as i64 * out_step / in_step + 1) as usize;
    let mut output = Vec::with_capacity(capacity);
    let mut samples = input.iter();

    loop {
        while state.phase < 0 {
            match samples.next() {
                Some(&next) => {
                    state.prev = state.cur;
                    state.cur = next;
                    state.phase += out_step;
                }
                None => return (output, state),
            }
        }
        while state.phase >= 0 {
            let value = (state.prev as i64 * state.phase
                + state.cur as i64 * (out_step - state.phase))
                / out_step;
            output.push(value.clamp(i16::MIN as i64, i16::MAX as i64) as i16);
            state.phase -= in_step;
        }
    }
}

/// A resampler bound to one stream direction and a fixed pair of rates.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    state: ResampleState,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Self {
        Self {
            in_rate,
            out_rate,
            state: ResampleState::default(),
        }
    }

    pub fn in_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn out_rate(&self) -> u32 {
        self.out_rate
    }

    /// Convert the next chunk of the stream.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        let (output, state) = resample(input, self.in_rate, self.out_rate, self.state);
        self.state = state;
        output
    }
}
