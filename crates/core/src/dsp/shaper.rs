//! Static waveshaping curves for the drive stage of a tone chain.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ShaperCurve {
    /// Asymmetric exponential soft clip, harder on the negative half.
    #[default]
    Tube,
    /// Rectifying fuzz that adds an octave-up component.
    OctaveFuzz,
    /// Plain hyperbolic tangent saturation.
    Tanh,
    /// Hard tanh blended with a sine fold.
    FuzzBlend,
}

impl ShaperCurve {
    /// Applies the curve with the given drive amount; output stays in [-1, 1].
    #[inline]
    pub fn apply(self, x: f32, drive: f32) -> f32 {
        let drive = drive.max(0.0);
        match self {
            ShaperCurve::Tube => {
                let k = drive.max(0.5);
                let x = x.clamp(-1.0, 1.0);
                if x >= 0.0 {
                    1.0 - (-x * k).exp()
                } else {
                    -(1.0 - (x * k * 1.2).exp()) * 0.95
                }
            }
            ShaperCurve::OctaveFuzz => {
                let k = 1.0 + drive;
                let folded = 0.6 * (k * x).tanh() + 0.4 * (k * x.abs()).tanh();
                folded.clamp(-1.0, 1.0)
            }
            ShaperCurve::Tanh => {
                if drive <= 0.0 {
                    return x.clamp(-1.0, 1.0);
                }
                ((drive * x).tanh() / drive.tanh()).clamp(-1.0, 1.0)
            }
            ShaperCurve::FuzzBlend => {
                let hard = (6.0 * x).tanh() * 0.85;
                let fold = (x * PI * (1.0 + 0.1 * drive)).sin() * 0.15;
                (hard + fold).clamp(-1.0, 1.0)
            }
        }
    }

    /// Picks the curve of whichever endpoint dominates a blend.
    pub fn blend(a: Self, b: Self, t: f32) -> Self {
        if t < 0.5 {
            a
        } else {
            b
        }
    }
}
