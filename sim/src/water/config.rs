//! Wave configuration for a procedurally animated water surface.
//!
//! A surface is two traveling sine waves plus a noise displacement term.
//! The same parameters drive the approximate per-point query and the
//! batched accurate query.

use bevy::math::Vec2;
use bevy_log::warn;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::constants::{WAVE_AMPLITUDE_DIVISOR, WAVE_SPEED_SCALE};
use crate::error::ConfigError;

pub const DEFAULT_FREQUENCY: f32 = 1.0;
pub const DEFAULT_REFERENCE_SIZE: f32 = 100.0;

/// One sinusoidal component of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveComponent {
    /// Height multiplier before reference size scaling
    pub amplitude: f32,
    /// Spatial frequency, must be positive
    pub frequency: f32,
    /// Phase speed, scaled by `WAVE_SPEED_SCALE`
    pub speed: f32,
}

impl WaveComponent {
    pub const fn new(amplitude: f32, frequency: f32, speed: f32) -> Self {
        Self {
            amplitude,
            frequency,
            speed,
        }
    }

    /// Wave number k = 2π · frequency
    #[inline(always)]
    pub fn wave_number(&self) -> f32 {
        2.0 * PI * self.frequency
    }

    /// World-space amplitude for a surface of the given reference size.
    #[inline(always)]
    pub fn scaled_amplitude(&self, reference_size: f32) -> f32 {
        self.amplitude * reference_size * self.frequency
            / (self.wave_number() * WAVE_AMPLITUDE_DIVISOR)
    }

    /// Phase advance per second.
    #[inline(always)]
    pub fn angular_speed(&self) -> f32 {
        self.wave_number() * self.speed * WAVE_SPEED_SCALE
    }

    /// Time after which this component repeats. Infinite for a standing wave.
    pub fn period(&self) -> f32 {
        let omega = self.angular_speed().abs();
        if omega > 0.0 {
            2.0 * PI / omega
        } else {
            f32::INFINITY
        }
    }

    fn validate(&self, wave: &'static str) -> Result<(), ConfigError> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(ConfigError::InvalidFrequency {
                wave,
                value: self.frequency,
            });
        }
        Ok(())
    }
}

impl Default for WaveComponent {
    fn default() -> Self {
        Self::new(1.0, 10.0, 0.25)
    }
}

/// Low frequency displacement noise layered on top of the two waves.
/// Only the accurate query path evaluates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplacementNoise {
    pub amplitude: f32,
    pub speed: f32,
    pub scale: f32,
}

impl DisplacementNoise {
    pub const NONE: Self = Self {
        amplitude: 0.0,
        speed: 0.0,
        scale: 1.0,
    };
}

impl Default for DisplacementNoise {
    fn default() -> Self {
        Self {
            amplitude: 2.0,
            speed: 1.5,
            scale: 3.5,
        }
    }
}

/// Complete description of one water surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Travel direction of the primary wave on the XZ plane
    pub direction: Vec2,
    pub primary: WaveComponent,
    /// Travels along the primary direction mirrored on X
    pub secondary: WaveComponent,
    pub noise: DisplacementNoise,
    /// Horizontal size used to normalize spatial frequency
    pub reference_size: f32,
    /// Resting height of the surface
    pub base_level: f32,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            direction: Vec2::ONE,
            primary: WaveComponent::default(),
            secondary: WaveComponent::new(0.5, 6.0, 0.4),
            noise: DisplacementNoise::default(),
            reference_size: DEFAULT_REFERENCE_SIZE,
            base_level: 0.0,
        }
    }
}

impl WaveParams {
    /// Normalized travel direction. Components are clamped to [-1, 1] first.
    pub fn unit_direction(&self) -> Vec2 {
        self.direction
            .clamp(Vec2::NEG_ONE, Vec2::ONE)
            .normalize_or_zero()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_direction() == Vec2::ZERO {
            return Err(ConfigError::ZeroDirection(self.direction.x, self.direction.y));
        }
        self.primary.validate("primary")?;
        self.secondary.validate("secondary")?;
        if !(self.reference_size.is_finite() && self.reference_size > 0.0) {
            return Err(ConfigError::InvalidReferenceSize(self.reference_size));
        }
        Ok(())
    }

    /// Returns a copy that passes [`WaveParams::validate`], replacing every
    /// invalid field with its default and logging what was replaced.
    pub fn sanitized(mut self) -> Self {
        while let Err(err) = self.validate() {
            warn!("Invalid wave parameters: {}. Falling back to default", err);
            match err {
                ConfigError::ZeroDirection(..) => self.direction = Vec2::X,
                ConfigError::InvalidFrequency { wave: "primary", .. } => {
                    self.primary.frequency = DEFAULT_FREQUENCY
                }
                ConfigError::InvalidFrequency { .. } => self.secondary.frequency = DEFAULT_FREQUENCY,
                ConfigError::InvalidReferenceSize(_) => self.reference_size = DEFAULT_REFERENCE_SIZE,
                _ => break,
            }
        }
        self.direction = self.unit_direction();
        self
    }
}

/// Ready-made surfaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum WavePreset {
    /// Flat water at the base level
    Still,
    /// Long, low swell
    Calm,
    /// Sheltered water with a light chop
    Lagoon,
    /// Open water surface
    #[default]
    Open,
    /// Tall fast waves with strong noise
    Storm,
}

impl WavePreset {
    pub fn to_params(self, base_level: f32) -> WaveParams {
        let base = WaveParams {
            base_level,
            ..WaveParams::default()
        };

        match self {
            WavePreset::Still => WaveParams {
                primary: WaveComponent::new(0.0, 1.0, 0.0),
                secondary: WaveComponent::new(0.0, 1.0, 0.0),
                noise: DisplacementNoise::NONE,
                ..base
            },
            WavePreset::Calm => WaveParams {
                direction: Vec2::new(1.0, 0.2),
                primary: WaveComponent::new(0.4, 4.0, 0.15),
                secondary: WaveComponent::new(0.2, 3.0, 0.2),
                noise: DisplacementNoise {
                    amplitude: 0.5,
                    ..DisplacementNoise::default()
                },
                ..base
            },
            WavePreset::Lagoon => WaveParams {
                direction: Vec2::new(0.6, 1.0),
                primary: WaveComponent::new(0.6, 12.0, 0.3),
                secondary: WaveComponent::new(0.4, 8.0, 0.5),
                noise: DisplacementNoise {
                    amplitude: 1.0,
                    speed: 1.0,
                    scale: 5.0,
                },
                ..base
            },
            WavePreset::Open => base,
            WavePreset::Storm => WaveParams {
                direction: Vec2::new(1.0, 0.4),
                primary: WaveComponent::new(3.0, 6.0, 0.6),
                secondary: WaveComponent::new(1.5, 9.0, 0.8),
                noise: DisplacementNoise {
                    amplitude: 4.0,
                    speed: 3.0,
                    scale: 2.5,
                },
                ..base
            },
        }
    }
}
