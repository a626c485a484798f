use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use anyhow::Result;
use rune_anim::{
    Animation, AnimationError, AnimationPromise, DocumentTimeline, EffectTiming, InlineStyle,
    Keyframe, KeyframeEffect, ManualHost, PlayState, TimelineHandle,
};

fn poll(promise: &AnimationPromise) -> Poll<Result<(), AnimationError>> {
    let mut promise = promise.clone();
    let mut cx = Context::from_waker(Waker::noop());
    Pin::new(&mut promise).poll(&mut cx)
}

fn setup(timing: EffectTiming) -> Result<(Rc<ManualHost>, Animation)> {
    let host = Rc::new(ManualHost::new());
    let timeline: TimelineHandle = Rc::new(DocumentTimeline::new(host.clone(), 0.0));
    let effect = KeyframeEffect::new(
        Some(InlineStyle::shared()),
        vec![
            Keyframe::new().set("transform", "translateX(0)"),
            Keyframe::new().set("transform", "translateX(100px)"),
        ],
        timing,
    )?;
    let animation = Animation::new(host.clone(), Some(effect), Some(timeline));
    Ok((host, animation))
}

#[test]
fn pausing_twice_keeps_the_paused_time() -> Result<()> {
    let (host, animation) = setup(EffectTiming::from(1000.0))?;
    animation.play()?;
    host.advance(240.0);

    animation.pause()?;
    host.advance(100.0);
    let paused_at = animation.current_time();
    assert_eq!(paused_at, Some(240.0));

    animation.pause()?;
    host.advance(100.0);
    assert_eq!(animation.current_time(), paused_at);
    assert_eq!(animation.play_state(), PlayState::Paused);
    assert!(animation.ready().is_fulfilled());
    Ok(())
}

#[test]
fn resuming_after_a_pause_continues_where_it_stopped() -> Result<()> {
    let (host, interrupted) = setup(EffectTiming::from(1000.0))?;
    let (other_host, continuous) = setup(EffectTiming::from(1000.0))?;

    interrupted.play()?;
    host.advance(100.0);
    interrupted.pause()?;
    host.advance(50.0);
    interrupted.play()?;
    host.advance(100.0);

    continuous.play()?;
    other_host.advance(200.0);

    assert_eq!(interrupted.current_time(), Some(200.0));
    assert_eq!(interrupted.current_time(), continuous.current_time());
    assert_eq!(interrupted.play_state(), PlayState::Running);
    Ok(())
}

#[test]
fn finish_lands_on_the_playback_boundary() -> Result<()> {
    let timing = EffectTiming::new()
        .delay_ms(100.0)
        .duration_ms(200.0)
        .end_delay_ms(50.0);

    let (_host, forwards) = setup(timing.clone())?;
    forwards.play()?;
    forwards.finish()?;
    assert_eq!(forwards.current_time(), Some(350.0));
    assert_eq!(forwards.play_state(), PlayState::Finished);

    let (_host, backwards) = setup(timing)?;
    backwards.set_playback_rate(-1.0);
    backwards.play()?;
    backwards.finish()?;
    assert_eq!(backwards.current_time(), Some(0.0));
    assert_eq!(backwards.play_state(), PlayState::Finished);
    assert_eq!(poll(&backwards.finished()), Poll::Ready(Ok(())));
    Ok(())
}

#[test]
fn cancel_rejects_finished_and_play_issues_a_new_handle() -> Result<()> {
    let (host, animation) = setup(EffectTiming::from(300.0))?;
    animation.play()?;
    host.advance(50.0);

    let cancelled = animation.finished();
    assert!(poll(&cancelled).is_pending());
    animation.cancel();
    assert_eq!(poll(&cancelled), Poll::Ready(Err(AnimationError::Abort)));
    assert_eq!(animation.play_state(), PlayState::Idle);

    animation.play()?;
    let renewed = animation.finished();
    assert!(!renewed.ptr_eq(&cancelled));
    assert!(renewed.is_pending());

    host.advance(400.0);
    assert_eq!(poll(&renewed), Poll::Ready(Ok(())));
    assert!(cancelled.is_rejected());
    Ok(())
}

#[test]
fn ready_settles_when_the_pending_play_completes() -> Result<()> {
    let (host, animation) = setup(EffectTiming::from(300.0))?;
    animation.play()?;
    let ready = animation.ready();
    assert!(animation.pending());
    assert!(poll(&ready).is_pending());

    host.run_microtasks();
    assert_eq!(poll(&ready), Poll::Ready(Ok(())));
    assert!(!animation.pending());

    // A second play while running changes nothing.
    animation.play()?;
    assert!(animation.ready().ptr_eq(&ready));
    Ok(())
}

#[test]
fn seeking_back_from_finished_resumes_running() -> Result<()> {
    let (host, animation) = setup(EffectTiming::from(200.0))?;
    animation.play()?;
    host.advance(300.0);
    let first = animation.finished();
    assert!(first.is_fulfilled());

    animation.set_current_time(Some(100.0))?;
    assert_eq!(animation.play_state(), PlayState::Running);
    let second = animation.finished();
    assert!(!second.ptr_eq(&first));
    assert!(second.is_pending());

    host.advance(150.0);
    assert_eq!(animation.current_time(), Some(200.0));
    assert!(second.is_fulfilled());
    Ok(())
}

#[test]
fn infinite_effects_cannot_finish_or_play_backwards() -> Result<()> {
    let timing = EffectTiming::new().duration_ms(100.0).iterations(f64::INFINITY);
    let (_host, animation) = setup(timing)?;

    assert!(matches!(animation.finish(), Err(AnimationError::InvalidState(_))));
    animation.set_playback_rate(-1.0);
    assert!(matches!(animation.play(), Err(AnimationError::InvalidState(_))));
    assert!(matches!(animation.pause(), Err(AnimationError::InvalidState(_))));
    assert_eq!(animation.play_state(), PlayState::Idle);
    Ok(())
}
