//! Synthesised drum kit. Every hit is a short one-shot voice built from
//! pitch-swept sines and filtered noise; the kit bus splits into a dry
//! path, a room reverb and a parallel-compressed punch path.

use crate::config::EngineConfig;
use crate::drums::DrumHit;
use crate::dsp::{Automation, Biquad, Compressor, FilterKind, Oscillator, Reverb, Waveform};
use crate::voice::{NoiseBurst, Partial, Voice, VoiceId};

use super::{noise_seed, one_shot, EngineCore, Instrument, ToneState};

const TOM_HIGH_HZ: f32 = 200.0;
const TOM_MID_HZ: f32 = 140.0;
const TOM_LOW_HZ: f32 = 90.0;

/// Mix of the kit's three output paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomState {
    pub wet: f32,
    pub dry: f32,
    pub punch: f32,
}

impl RoomState {
    pub const DOOM: Self = Self {
        wet: 0.10,
        dry: 0.32,
        punch: 0.35,
    };

    pub const SPACE: Self = Self {
        wet: 0.20,
        dry: 0.28,
        punch: 0.20,
    };

    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            wet: mix(self.wet, other.wet),
            dry: mix(self.dry, other.dry),
            punch: mix(self.punch, other.punch),
        }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::DOOM
    }
}

fn swept(waveform: Waveform, from: f32, to: f32, start: f64, over: f64) -> Partial {
    let mut line = Automation::new(from);
    line.set_value_at(from, start)
        .exponential_ramp_to(to, start + over);
    Partial::new(Oscillator::new(waveform), from, 1.0).frequency(line)
}

#[derive(Debug)]
pub struct DrumKit {
    core: EngineCore,
    room: RoomState,
    reverb: Reverb,
    punch: Compressor,
}

impl DrumKit {
    pub fn new(config: &EngineConfig, sample_rate: f32) -> Self {
        let mut reverb = Reverb::new(0.55, 0.35, sample_rate);
        reverb.mix = 1.0;
        Self {
            core: EngineCore::new(config, sample_rate, 1.0, true),
            room: RoomState::default(),
            reverb,
            punch: Compressor::new(-30.0, 12.0, 0.003, 0.25, sample_rate).with_makeup_db(12.0),
        }
    }

    pub fn room(&self) -> RoomState {
        self.room
    }

    pub fn set_room(&mut self, room: RoomState) {
        self.room = room;
    }

    /// Schedules one hit at `time`. Velocity scales the whole recipe.
    pub fn hit(&mut self, hit: DrumHit, time: f64, velocity: f32) -> VoiceId {
        let voice = self.recipe(hit, time).scaled(velocity.clamp(0.0, 1.0));
        self.core.attach(voice)
    }

    fn recipe(&self, hit: DrumHit, t: f64) -> Voice {
        let rate = self.core.sample_rate;
        let filter = |kind, hz, q| Biquad::new(kind, hz, q, rate);
        let noise = |salt, gain, length| NoiseBurst::new(noise_seed(t, salt), one_shot(gain, t, length));
        let shell = |length: f64| Voice::new(t, t + length, rate, Automation::new(1.0));

        match hit {
            DrumHit::Kick => shell(0.7)
                .partial(swept(Waveform::Sine, 110.0, 32.0, t, 0.35).envelope(one_shot(0.55, t, 0.5)))
                .partial(swept(Waveform::Sine, 55.0, 20.0, t, 0.4).envelope(one_shot(0.40, t, 0.6)))
                .burst(noise(10, 0.3, 0.008).filter(filter(FilterKind::HighPass, 3_000.0, 0.707))),
            DrumHit::Snare => shell(0.3)
                .partial(
                    swept(Waveform::Triangle, 210.0, 130.0, t, 0.08).envelope(one_shot(0.32, t, 0.2)),
                )
                .burst(
                    noise(11, 0.25, 0.25)
                        .filter(filter(FilterKind::HighPass, 2_000.0, 0.707))
                        .filter(filter(FilterKind::BandPass, 4_000.0, 1.0)),
                ),
            DrumHit::ClosedHat | DrumHit::OpenHat => {
                let (gain, length) = if hit == DrumHit::OpenHat {
                    (0.18, 0.3)
                } else {
                    (0.15, 0.06)
                };
                shell(length + 0.02).burst(
                    noise(12, gain, length)
                        .filter(filter(FilterKind::HighPass, 7_500.0, 0.707))
                        .filter(filter(FilterKind::BandPass, 10_000.0, 2.0)),
                )
            }
            DrumHit::Ride | DrumHit::RideBell => {
                let ride = shell(0.85).burst(
                    noise(13, 0.1, 0.8)
                        .filter(filter(FilterKind::HighPass, 5_000.0, 0.707))
                        .filter(filter(FilterKind::Peaking(4.0), 8_000.0, 3.0)),
                );
                if hit == DrumHit::RideBell {
                    ride.partial(
                        Partial::new(Oscillator::new(Waveform::Sine), 4_200.0, 1.0)
                            .envelope(one_shot(0.04, t, 0.5)),
                    )
                } else {
                    ride
                }
            }
            DrumHit::TomHigh | DrumHit::TomMid | DrumHit::TomLow => {
                let pitch = match hit {
                    DrumHit::TomHigh => TOM_HIGH_HZ,
                    DrumHit::TomMid => TOM_MID_HZ,
                    _ => TOM_LOW_HZ,
                };
                shell(0.4).partial(
                    swept(Waveform::Sine, pitch, pitch * 0.5, t, 0.3).envelope(one_shot(0.5, t, 0.35)),
                )
            }
            DrumHit::Crash => shell(1.55).burst(
                noise(14, 0.2, 1.5).filter(filter(FilterKind::HighPass, 4_000.0, 0.707)),
            ),
        }
    }
}

impl Instrument for DrumKit {
    fn name(&self) -> &'static str {
        "drums"
    }

    /// The kit has no amp chain; its colour comes from [`RoomState`].
    fn set_tone(&mut self, _tone: &ToneState, _now: f64) {}

    fn mute_all(&mut self, now: f64) {
        self.core.bank.mute_all(now);
    }

    fn fade_in(&mut self, seconds: f64, now: f64) {
        self.core.fade_in(seconds, now);
    }

    fn fade_out(&mut self, seconds: f64, now: f64) {
        self.core.fade_out(seconds, now);
    }

    fn render(&mut self, start_time: f64, dt: f64, out: &mut [f32]) {
        let Self {
            core,
            room,
            reverb,
            punch,
        } = self;
        core.render_with(start_time, dt, out, |x, _| {
            x * room.dry + reverb.process(x) * room.wet + punch.process(x) * room.punch
        });
    }

    fn active_voices(&self) -> usize {
        self.core.bank.active_voices()
    }
}
