//! Ephemeral per-note voices and the buses that own them.
//!
//! A [`Voice`] is built once by an instrument, attached to the instrument's
//! current [`Bus`] and rendered until its expiry time, at which point the
//! next [`VoiceBank::sweep`] drops it. Disposal is keyed by [`VoiceId`] and
//! is idempotent: disposing an id that is already gone reports `false`.

use std::mem;

use crate::config::EngineConfig;
use crate::dsp::{cents_to_ratio, Automation, Biquad, FilterKind, Noise, Oscillator};

pub type VoiceId = u64;

/// Slow pitch modulation in cents, used for tape wobble and vibrato.
#[derive(Debug, Clone)]
pub struct Wobble {
    rate: f32,
    depth_cents: f32,
    phase: f32,
}

impl Wobble {
    pub fn new(rate: f32, depth_cents: f32) -> Self {
        Self {
            rate,
            depth_cents,
            phase: 0.0,
        }
    }

    fn next(&mut self, dt: f32) -> f32 {
        let cents = self.depth_cents * (std::f32::consts::TAU * self.phase).sin();
        self.phase = (self.phase + self.rate * dt).fract();
        cents_to_ratio(cents)
    }
}

/// One oscillator of a voice.
#[derive(Debug, Clone)]
pub struct Partial {
    osc: Oscillator,
    frequency: Automation,
    ratio: f32,
    gain: f32,
    envelope: Option<Automation>,
    wobble: Option<Wobble>,
}

impl Partial {
    pub fn new(osc: Oscillator, frequency: f32, gain: f32) -> Self {
        Self {
            osc,
            frequency: Automation::new(frequency),
            ratio: 1.0,
            gain,
            envelope: None,
            wobble: None,
        }
    }

    /// Fixed multiple of the fundamental, detune included.
    pub fn ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn detune(mut self, cents: f32) -> Self {
        self.ratio *= cents_to_ratio(cents);
        self
    }

    /// Replaces the static fundamental with a timeline (slides, drum sweeps).
    pub fn frequency(mut self, frequency: Automation) -> Self {
        self.frequency = frequency;
        self
    }

    /// Own amplitude envelope, multiplied with the voice envelope.
    pub fn envelope(mut self, envelope: Automation) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn wobble(mut self, wobble: Wobble) -> Self {
        self.wobble = Some(wobble);
        self
    }

    fn next(&mut self, time: f64, dt: f32) -> f32 {
        let mut frequency = self.frequency.value_at(time) * self.ratio;
        if let Some(wobble) = &mut self.wobble {
            frequency *= wobble.next(dt);
        }
        let level = self.envelope.as_ref().map_or(1.0, |env| env.value_at(time));
        self.osc.next(frequency, dt) * self.gain * level
    }
}

/// Filtered noise transient: pick, finger, beater or cymbal wash.
#[derive(Debug, Clone)]
pub struct NoiseBurst {
    noise: Noise,
    filters: Vec<Biquad>,
    envelope: Automation,
}

impl NoiseBurst {
    pub fn new(seed: u32, envelope: Automation) -> Self {
        Self {
            noise: Noise::new(seed),
            filters: Vec::new(),
            envelope,
        }
    }

    pub fn filter(mut self, filter: Biquad) -> Self {
        self.filters.push(filter);
        self
    }

    fn next(&mut self, time: f64) -> f32 {
        let x = self.noise.next();
        let y = self.filters.iter_mut().fold(x, |acc, f| f.process(acc));
        y * self.envelope.value_at(time)
    }
}

#[derive(Debug, Clone)]
struct VoiceFilter {
    biquad: Biquad,
    q: f32,
    cutoff: Automation,
}

const FILTER_UPDATE_INTERVAL: u32 = 16;

#[derive(Debug, Clone)]
pub struct Voice {
    start: f64,
    stop: f64,
    expires_at: f64,
    sample_rate: f32,
    partials: Vec<Partial>,
    bursts: Vec<NoiseBurst>,
    envelope: Automation,
    gain: f32,
    filter: Option<VoiceFilter>,
    rendered: u32,
}

impl Voice {
    /// A voice audible from `start` until `stop`, shaped by `envelope`.
    pub fn new(start: f64, stop: f64, sample_rate: f32, envelope: Automation) -> Self {
        let stop = stop.max(start);
        Self {
            start,
            stop,
            expires_at: stop,
            sample_rate,
            partials: Vec::new(),
            bursts: Vec::new(),
            envelope,
            gain: 1.0,
            filter: None,
            rendered: 0,
        }
    }

    pub fn partial(mut self, partial: Partial) -> Self {
        self.partials.push(partial);
        self
    }

    /// Scales the whole voice, typically by velocity.
    pub fn scaled(mut self, gain: f32) -> Self {
        self.gain *= gain;
        self
    }

    pub fn burst(mut self, burst: NoiseBurst) -> Self {
        self.bursts.push(burst);
        self
    }

    /// Per-voice filter whose cutoff follows a timeline.
    pub fn filter(mut self, kind: FilterKind, q: f32, cutoff: Automation) -> Self {
        let initial = cutoff.value_at(self.start);
        self.filter = Some(VoiceFilter {
            biquad: Biquad::new(kind, initial, q, self.sample_rate),
            q,
            cutoff,
        });
        self
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn expires_at(&self) -> f64 {
        self.expires_at
    }

    /// Adds the voice into `out`, one sample every `dt` seconds from `t0`.
    pub fn render(&mut self, t0: f64, dt: f64, out: &mut [f32]) {
        let step = dt as f32;
        for (i, sample) in out.iter_mut().enumerate() {
            let time = t0 + i as f64 * dt;
            if time < self.start || time >= self.stop {
                continue;
            }

            let mut acc = 0.0;
            for partial in &mut self.partials {
                acc += partial.next(time, step);
            }
            for burst in &mut self.bursts {
                acc += burst.next(time);
            }

            if let Some(filter) = &mut self.filter {
                if self.rendered % FILTER_UPDATE_INTERVAL == 0 {
                    let kind = filter.biquad.kind();
                    let cutoff = filter.cutoff.value_at(time);
                    filter.biquad.set(kind, cutoff, filter.q, self.sample_rate);
                }
                acc = filter.biquad.process(acc);
            }
            self.rendered = self.rendered.wrapping_add(1);

            *sample += acc * self.envelope.value_at(time) * self.gain;
        }
    }
}

/// Voices keyed by id, in insertion order.
#[derive(Debug, Default)]
pub struct VoiceArena {
    voices: Vec<(VoiceId, Voice)>,
    next_id: VoiceId,
}

impl VoiceArena {
    pub fn insert(&mut self, voice: Voice) -> VoiceId {
        let id = self.next_id;
        self.next_id += 1;
        self.voices.push((id, voice));
        id
    }

    pub fn dispose_all(&mut self) -> usize {
        let count = self.voices.len();
        self.voices.clear();
        count
    }

    /// Disposes every voice whose expiry has passed.
    pub fn sweep(&mut self, now: f64) -> usize {
        let before = self.voices.len();
        self.voices.retain(|(_, voice)| voice.expires_at > now);
        before - self.voices.len()
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|(voice_id, _)| *voice_id == id)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    fn render(&mut self, t0: f64, dt: f64, out: &mut [f32]) {
        for (_, voice) in &mut self.voices {
            voice.render(t0, dt, out);
        }
    }
}

/// Summing point for voices with its own gain timeline.
#[derive(Debug)]
pub struct Bus {
    gain: Automation,
    voices: VoiceArena,
    retire_at: Option<f64>,
    mix: Vec<f32>,
}

impl Bus {
    fn new(first_id: VoiceId) -> Self {
        Self {
            gain: Automation::new(1.0),
            voices: VoiceArena {
                voices: Vec::new(),
                next_id: first_id,
            },
            retire_at: None,
            mix: Vec::new(),
        }
    }

    pub fn gain_at(&self, time: f64) -> f32 {
        self.gain.value_at(time)
    }

    pub fn voices(&self) -> &VoiceArena {
        &self.voices
    }

    fn render(&mut self, t0: f64, dt: f64, out: &mut [f32]) {
        if self.voices.is_empty() {
            return;
        }
        self.mix.clear();
        self.mix.resize(out.len(), 0.0);
        self.voices.render(t0, dt, &mut self.mix);
        for (i, (sample, voiced)) in out.iter_mut().zip(&self.mix).enumerate() {
            *sample += voiced * self.gain.value_at(t0 + i as f64 * dt);
        }
    }
}

/// The voice-lifetime half of an instrument engine: one live input bus plus
/// any buses still ramping out after a `mute_all`.
#[derive(Debug)]
pub struct VoiceBank {
    current: Bus,
    retiring: Vec<Bus>,
    mute_ramp: f64,
    tail_margin: f64,
}

impl VoiceBank {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            current: Bus::new(0),
            retiring: Vec::new(),
            mute_ramp: config.mute_ramp.max(0.0),
            tail_margin: config.voice_tail_margin.max(0.0),
        }
    }

    /// Attaches a voice to the current bus. It stays allocated until its
    /// stop time plus the tail margin.
    pub fn attach(&mut self, mut voice: Voice) -> VoiceId {
        voice.expires_at = voice.stop + self.tail_margin;
        self.current.voices.insert(voice)
    }

    /// Whether voice `id` is still allocated on any bus.
    pub fn contains(&self, id: VoiceId) -> bool {
        self.current.voices.contains(id) || self.retiring.iter().any(|bus| bus.voices.contains(id))
    }

    /// Swaps in a fresh bus and ramps the old one to silence over the mute
    /// ramp. Calling it again right away retires an empty bus, which leaves
    /// the audible result unchanged.
    pub fn mute_all(&mut self, now: f64) {
        let next_id = self.current.voices.next_id;
        let mut old = mem::replace(&mut self.current, Bus::new(next_id));
        if old.voices.is_empty() {
            return;
        }

        let held = old.gain.cancel_and_hold(now);
        old.gain
            .set_value_at(held, now)
            .linear_ramp_to(0.0, now + self.mute_ramp);
        old.retire_at = Some(now + self.mute_ramp);
        tracing::trace!(voices = old.voices.len(), "retiring bus");
        self.retiring.push(old);
    }

    /// Drops expired voices and fully faded buses.
    pub fn sweep(&mut self, now: f64) -> usize {
        let mut disposed = self.current.voices.sweep(now);
        self.retiring.retain_mut(|bus| match bus.retire_at {
            Some(at) if at <= now => {
                disposed += bus.voices.dispose_all();
                false
            }
            _ => {
                disposed += bus.voices.sweep(now);
                !bus.voices.is_empty()
            }
        });
        disposed
    }

    pub fn render(&mut self, t0: f64, dt: f64, out: &mut [f32]) {
        self.current.render(t0, dt, out);
        for bus in &mut self.retiring {
            bus.render(t0, dt, out);
        }
    }

    pub fn current(&self) -> &Bus {
        &self.current
    }

    pub fn active_voices(&self) -> usize {
        self.current.voices.len() + self.retiring.iter().map(|b| b.voices.len()).sum::<usize>()
    }

    pub fn retiring_buses(&self) -> usize {
        self.retiring.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::Waveform;

    const RATE: f32 = 8_000.0;

    fn tone(start: f64, stop: f64) -> Voice {
        let mut env = Automation::new(0.0);
        env.set_value_at(1.0, start);
        Voice::new(start, stop, RATE, env).partial(Partial::new(
            Oscillator::new(Waveform::Square),
            200.0,
            0.5,
        ))
    }

    fn render(bank: &mut VoiceBank, t0: f64, n: usize) -> Vec<f32> {
        let mut out = vec![0.0; n];
        bank.render(t0, 1.0 / RATE as f64, &mut out);
        out
    }

    #[test]
    fn voice_is_silent_outside_its_window() {
        let mut voice = tone(0.01, 0.02);
        let mut out = vec![0.0; 240];
        voice.render(0.0, 1.0 / RATE as f64, &mut out);
        assert!(out[..80].iter().all(|s| *s == 0.0));
        assert!(out[80..160].iter().any(|s| *s != 0.0));
        assert!(out[161..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn teardown_after_mute_happens_once() {
        let mut bank = VoiceBank::new(&EngineConfig::default());
        let id = bank.attach(tone(0.0, 1.0));
        bank.mute_all(0.5);
        bank.mute_all(0.5);
        assert!(bank.contains(id));
        assert_eq!(bank.retiring_buses(), 1);

        assert_eq!(bank.sweep(0.52), 1);
        assert!(!bank.contains(id));
        assert_eq!(bank.sweep(0.6), 0);
        bank.mute_all(0.7);
        assert_eq!(bank.sweep(0.8), 0);
        assert_eq!(bank.active_voices(), 0);
        assert_eq!(bank.retiring_buses(), 0);
    }

    #[test]
    fn sweep_honours_tail_margin() {
        let config = EngineConfig {
            voice_tail_margin: 0.3,
            ..Default::default()
        };
        let mut bank = VoiceBank::new(&config);
        bank.attach(tone(0.0, 1.0));
        assert_eq!(bank.sweep(1.2), 0);
        assert_eq!(bank.sweep(1.31), 1);
    }

    #[test]
    fn mute_all_ramps_old_bus_and_routes_new_voices_to_fresh_bus() {
        let mut bank = VoiceBank::new(&EngineConfig::default());
        bank.attach(tone(0.0, 10.0));
        bank.mute_all(1.0);

        assert_eq!(bank.current().voices().len(), 0);
        assert_eq!(bank.retiring_buses(), 1);
        assert!(bank.retiring[0].gain_at(1.0) > 0.99);
        assert!(bank.retiring[0].gain_at(1.0075) < 0.6);
        assert_eq!(bank.retiring[0].gain_at(1.015), 0.0);

        bank.attach(tone(1.0, 10.0));
        assert_eq!(bank.current().voices().len(), 1);

        // After the ramp the old bus contributes nothing and is released.
        let after = render(&mut bank, 1.02, 64);
        let mut alone = VoiceBank::new(&EngineConfig::default());
        alone.attach(tone(1.0, 10.0));
        assert_eq!(after, render(&mut alone, 1.02, 64));

        bank.sweep(1.02);
        assert_eq!(bank.retiring_buses(), 0);
    }

    #[test]
    fn double_mute_all_matches_single() {
        let mut once = VoiceBank::new(&EngineConfig::default());
        let mut twice = VoiceBank::new(&EngineConfig::default());
        for bank in [&mut once, &mut twice] {
            bank.attach(tone(0.0, 10.0));
        }
        once.mute_all(0.5);
        twice.mute_all(0.5);
        twice.mute_all(0.5);

        assert_eq!(render(&mut once, 0.49, 400), render(&mut twice, 0.49, 400));
        assert_eq!(once.retiring_buses(), twice.retiring_buses());
    }

    #[test]
    fn ids_stay_unique_across_bus_swaps() {
        let mut bank = VoiceBank::new(&EngineConfig::default());
        let first = bank.attach(tone(0.0, 1.0));
        bank.mute_all(0.1);
        let second = bank.attach(tone(0.0, 1.0));
        assert_ne!(first, second);
        assert!(bank.contains(first));
        assert!(bank.current().voices().contains(second));
        assert!(!bank.current().voices().contains(first));
    }
}
