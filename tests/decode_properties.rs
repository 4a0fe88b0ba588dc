//! Property tests for frame decoding and the envelope generator

use proptest::prelude::*;
use psg_replay::{
    ChannelControl, ChipConfig, EnvelopeShape, EnvelopeState, RegisterDecoder, RegisterFrame,
    UserControls,
};

fn control() -> impl Strategy<Value = ChannelControl> {
    (any::<bool>(), -10.0f32..10.0).prop_map(|(muted, volume)| ChannelControl::new(muted, volume))
}

fn controls() -> impl Strategy<Value = UserControls> {
    (prop::array::uniform3(control()), control())
        .prop_map(|(channels, noise)| UserControls { channels, noise })
}

proptest! {
    #[test]
    fn decode_is_total_and_clamped(
        regs in any::<[u8; 14]>(),
        controls in controls(),
        times in prop::collection::vec(0.0f64..10.0, 1..8),
    ) {
        let decoder = RegisterDecoder::new(ChipConfig::default());
        let mut envelope = EnvelopeState::new();
        let frame = RegisterFrame::new(regs);
        for now in times {
            let targets = decoder.decode(&frame, &mut envelope, &controls.clamped(), now);
            for tone in targets.tones {
                prop_assert!(tone.frequency.is_finite() && tone.frequency > 0.0);
                prop_assert!((0.0..=1.0).contains(&tone.gain));
                prop_assert!(tone.enabled || tone.gain == 0.0);
            }
            prop_assert!(targets.noise.center_frequency.is_finite());
            prop_assert!(targets.noise.center_frequency > 0.0);
            prop_assert!((0.0..=1.0).contains(&targets.noise.gain));
        }
    }

    #[test]
    fn decode_tolerates_raw_unclamped_controls(regs in any::<[u8; 14]>(), controls in controls()) {
        let decoder = RegisterDecoder::new(ChipConfig::default());
        let targets = decoder.decode(&RegisterFrame::new(regs), &mut EnvelopeState::new(), &controls, 0.0);
        for tone in targets.tones {
            prop_assert!((0.0..=1.0).contains(&tone.gain));
        }
        prop_assert!((0.0..=1.0).contains(&targets.noise.gain));
    }

    #[test]
    fn muted_channels_are_silent(regs in any::<[u8; 14]>()) {
        let decoder = RegisterDecoder::new(ChipConfig::default());
        let mut controls = UserControls::default();
        for control in controls.channels.iter_mut() {
            control.muted = true;
        }
        let targets = decoder.decode(&RegisterFrame::new(regs), &mut EnvelopeState::new(), &controls, 0.0);
        for tone in targets.tones {
            prop_assert_eq!(tone.gain, 0.0);
        }
        prop_assert_eq!(targets.noise.gain, 0.0);
    }

    #[test]
    fn envelope_phase_advances_while_unchanged(
        shape in 0u8..16,
        period in 0.001f64..1.0,
        steps in prop::collection::vec(0.0001f64..0.05, 1..20),
    ) {
        let shape = EnvelopeShape::from_register(shape);
        let mut envelope = EnvelopeState::new();
        let mut now = 0.0;
        envelope.update(period, shape, now);

        for step in steps {
            let before = envelope.phase();
            now += step;
            let level = envelope.update(period, shape, now);
            prop_assert!((0.0..=1.0).contains(&level));
            prop_assert!((0.0..1.0).contains(&envelope.phase()));

            // phase moved forward by exactly step/period, modulo one cycle
            let delta = (envelope.phase() - before).rem_euclid(1.0);
            let expected = (step / period).rem_euclid(1.0);
            let diff = (delta - expected).abs();
            prop_assert!(diff < 1e-6 || (1.0 - diff) < 1e-6, "delta {delta}, expected {expected}");
        }
    }

    #[test]
    fn envelope_level_is_continuous_within_a_segment(
        shape in 0u8..16,
        phase in 0.0f64..0.99,
    ) {
        let family = EnvelopeShape::from_register(shape).family();
        let a = family.level(phase, 0);
        let b = family.level(phase + 1e-4, 0);
        prop_assert!((a - b).abs() < 1e-3, "{family:?}: {a} vs {b}");
    }
}
