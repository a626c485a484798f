use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use rune_anim::{
    Animation, AnimationError, DocumentTimeline, EffectTiming, FillMode, InlineStyle, Keyframe,
    KeyframeEffect, ManualHost, Phase, PlayState, StyleTarget, TimelineHandle,
};

struct Stage {
    host: Rc<ManualHost>,
    timeline: TimelineHandle,
    style: Rc<RefCell<InlineStyle>>,
}

impl Stage {
    fn new() -> Self {
        let host = Rc::new(ManualHost::new());
        let timeline: TimelineHandle = Rc::new(DocumentTimeline::new(host.clone(), 0.0));
        Self {
            host,
            timeline,
            style: InlineStyle::shared(),
        }
    }

    fn play(&self, keyframes: Vec<Keyframe>, timing: EffectTiming) -> Result<Animation> {
        let effect = KeyframeEffect::new(Some(self.style.clone()), keyframes, timing)?;
        let animation = Animation::new(self.host.clone(), Some(effect), Some(self.timeline.clone()));
        animation.play()?;
        Ok(animation)
    }

    fn transform(&self) -> Option<String> {
        self.style.borrow().get("transform").map(str::to_string)
    }
}

fn slide() -> Vec<Keyframe> {
    vec![
        Keyframe::new().set("transform", "translateX(0)"),
        Keyframe::new().set("transform", "translateX(100px)"),
    ]
}

#[test]
fn single_keyframe_fills_forwards_once_finished() -> Result<()> {
    let stage = Stage::new();
    let timing = EffectTiming::new()
        .delay_ms(100.0)
        .duration_ms(200.0)
        .fill(FillMode::Forwards);
    let animation = stage.play(
        vec![Keyframe::new().set("transform", "translateX(100px)")],
        timing,
    )?;

    stage.host.advance(50.0);
    assert_eq!(stage.transform(), None);

    stage.host.advance(100.0);
    let effect = animation.effect().ok_or_else(|| anyhow::anyhow!("effect detached"))?;
    let timing = effect.get_computed_timing();
    assert_eq!(timing.phase, Phase::Active);
    assert_eq!(timing.progress, Some(0.25));
    assert_eq!(stage.transform(), None);

    stage.host.advance(100.0);
    assert_eq!(effect.get_computed_timing().progress, Some(0.75));
    assert_eq!(stage.transform(), None);

    stage.host.advance(50.0);
    assert_eq!(stage.transform().as_deref(), Some("translateX(100px)"));
    assert!(animation.finished().is_fulfilled());

    stage.host.advance(500.0);
    assert_eq!(stage.transform().as_deref(), Some("translateX(100px)"));
    assert_eq!(animation.play_state(), PlayState::Finished);
    Ok(())
}

#[test]
fn fill_none_restores_the_original_value() -> Result<()> {
    let stage = Stage::new();
    stage.style.borrow_mut().set_property("transform", "rotate(5deg)");
    let timing = EffectTiming::new().delay_ms(100.0).duration_ms(200.0);
    let animation = stage.play(slide(), timing)?;

    stage.host.advance(50.0);
    assert_eq!(stage.transform().as_deref(), Some("rotate(5deg)"));

    stage.host.advance(70.0);
    assert_eq!(stage.transform().as_deref(), Some("translateX(0)"));

    stage.host.advance(280.0);
    assert_eq!(animation.play_state(), PlayState::Finished);
    assert_eq!(stage.transform().as_deref(), Some("rotate(5deg)"));
    Ok(())
}

#[test]
fn reversing_mid_flight_returns_to_the_first_keyframe() -> Result<()> {
    let stage = Stage::new();
    let timing = EffectTiming::new().duration_ms(1000.0).fill(FillMode::Both);
    let animation = stage.play(slide(), timing)?;

    stage.host.advance(600.0);
    assert_eq!(stage.transform().as_deref(), Some("translateX(100px)"));

    animation.update_playback_rate(-1.0)?;
    stage.host.advance(700.0);
    assert_eq!(animation.playback_rate(), -1.0);
    assert_eq!(animation.current_time(), Some(0.0));
    assert_eq!(animation.play_state(), PlayState::Finished);
    assert_eq!(stage.transform().as_deref(), Some("translateX(0)"));
    Ok(())
}

#[test]
fn cancel_removes_filled_styles() -> Result<()> {
    let stage = Stage::new();
    let timing = EffectTiming::new().duration_ms(100.0).fill(FillMode::Forwards);
    let animation = stage.play(slide(), timing)?;

    stage.host.advance(200.0);
    assert_eq!(stage.transform().as_deref(), Some("translateX(100px)"));

    animation.cancel();
    assert_eq!(stage.transform(), None);
    Ok(())
}

#[test]
fn invalid_offsets_are_rejected_up_front() {
    let style = InlineStyle::shared();

    let negative = vec![Keyframe::at(-0.1).set("opacity", "0")];
    let result = KeyframeEffect::new(Some(style.clone()), negative, 100.0);
    assert!(matches!(result, Err(AnimationError::Type(_))));

    let unordered = vec![
        Keyframe::at(0.5).set("opacity", "0"),
        Keyframe::at(0.4).set("opacity", "1"),
    ];
    let result = KeyframeEffect::new(Some(style.clone()), unordered, 100.0);
    assert!(matches!(result, Err(AnimationError::Type(_))));
    assert!(style.borrow().is_empty());
}
