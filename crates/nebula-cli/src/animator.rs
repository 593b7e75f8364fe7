//! Mounted field views and their tick chain.
//!
//! A mounted view owns exactly one tokio task that ticks at the frame rate.
//! Each tick reads the latest feed snapshot and interaction state, draws one
//! complete frame, and only then waits for the next tick. Resizing stops and
//! joins the running chain before the replacement starts, so two chains never
//! overlap for the same view. The field outlives its chains: a resize moves
//! the existing nodes instead of rebuilding them, so glimmers carry over.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use nebula_core::{Canvas, Field, FrameReport, GlimmerPolicy, Interaction, Snapshot, Viewport, render_frame};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::term::TerminalCanvas;

/// A canvas that lives across mounts and can show a finished frame.
pub trait Surface: Canvas + Send + 'static {
    fn resize(&mut self, viewport: Viewport);
    fn present(&mut self, report: &FrameReport);
}

impl Surface for TerminalCanvas {
    fn resize(&mut self, viewport: Viewport) {
        TerminalCanvas::resize(self, viewport);
    }

    fn present(&mut self, _report: &FrameReport) {
        if let Err(e) = TerminalCanvas::present(self) {
            tracing::warn!("failed to write frame: {e}");
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ViewSettings {
    pub frame_period: Duration,
    pub policy: GlimmerPolicy,
    /// Stop on its own after this many frames.
    pub max_frames: Option<u64>,
}

impl ViewSettings {
    pub fn at_frame_rate(fps: u32) -> Self {
        Self {
            frame_period: Duration::from_secs(1) / fps.max(1),
            policy: GlimmerPolicy::default(),
            max_frames: None,
        }
    }
}

/// What a finished chain hands back to its view.
struct Parked<S> {
    surface: S,
    field: Field,
    frames: u64,
}

struct Chain<S> {
    token: CancellationToken,
    handle: JoinHandle<Parked<S>>,
}

pub struct FieldView<S: Surface> {
    feed: watch::Receiver<Snapshot>,
    interaction: watch::Receiver<Interaction>,
    settings: ViewSettings,
    surface: Option<S>,
    field: Option<Field>,
    chain: Option<Chain<S>>,
    frames: u64,
}

impl<S: Surface> FieldView<S> {
    pub fn new(
        surface: S,
        feed: watch::Receiver<Snapshot>,
        interaction: watch::Receiver<Interaction>,
        settings: ViewSettings,
    ) -> Self {
        Self {
            feed,
            interaction,
            settings,
            surface: Some(surface),
            field: None,
            chain: None,
            frames: 0,
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.chain.as_ref().is_some_and(|c| !c.handle.is_finished())
    }

    /// Frames drawn by every chain that has been joined so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    #[cfg(test)]
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    #[cfg(test)]
    pub fn field(&self) -> Option<&Field> {
        self.field.as_ref()
    }

    /// Start the tick chain for `viewport`. Any running chain is stopped first.
    pub async fn mount(&mut self, viewport: Viewport) -> Result<()> {
        self.stop(true).await?;
        let mut surface = self
            .surface
            .take()
            .ok_or_else(|| anyhow!("view surface lost"))?;
        surface.resize(viewport);

        let field = match self.field.take() {
            Some(mut field) => {
                field.resize(viewport);
                field
            }
            None => {
                let mut field = Field::with_policy(viewport, self.settings.policy);
                let snapshot = self.feed.borrow_and_update().clone();
                field.sync(&snapshot, viewport);
                field
            }
        };
        let feed = self.feed.clone();

        let token = CancellationToken::new();
        let handle = tokio::spawn(tick_chain(
            field,
            surface,
            feed,
            self.interaction.clone(),
            self.settings,
            token.clone(),
        ));
        self.chain = Some(Chain { token, handle });
        tracing::debug!(width = viewport.width, height = viewport.height, "view mounted");
        Ok(())
    }

    /// Move every node for the new viewport and restart the chain.
    pub async fn resize(&mut self, viewport: Viewport) -> Result<()> {
        self.mount(viewport).await
    }

    pub async fn unmount(&mut self) -> Result<()> {
        self.stop(true).await?;
        tracing::debug!(frames = self.frames, "view unmounted");
        Ok(())
    }

    /// Wait for a chain with a frame limit to run out on its own.
    pub async fn finished(&mut self) -> Result<()> {
        self.stop(false).await
    }

    async fn stop(&mut self, cancel: bool) -> Result<()> {
        let Some(chain) = self.chain.take() else {
            return Ok(());
        };
        if cancel {
            chain.token.cancel();
        }
        let parked = chain.handle.await.context("tick chain panicked")?;
        self.surface = Some(parked.surface);
        self.field = Some(parked.field);
        self.frames += parked.frames;
        Ok(())
    }
}

async fn tick_chain<S: Surface>(
    mut field: Field,
    mut surface: S,
    mut feed: watch::Receiver<Snapshot>,
    interaction: watch::Receiver<Interaction>,
    settings: ViewSettings,
    token: CancellationToken,
) -> Parked<S> {
    let mut ticker = tokio::time::interval(settings.frame_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rng = SmallRng::from_os_rng();
    let mut frames = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if feed.has_changed().unwrap_or(false) {
            let snapshot = feed.borrow_and_update().clone();
            let viewport = field.viewport();
            field.sync(&snapshot, viewport);
        }
        let ix = interaction.borrow().clone();

        let report = render_frame(&mut field, &ix, &mut surface, &mut rng);
        surface.present(&report);
        frames += 1;

        if settings.max_frames.is_some_and(|max| frames >= max) {
            break;
        }
    }
    Parked {
        surface,
        field,
        frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{DrawCommand, Fragment, Recorder};
    use std::sync::Arc;

    #[derive(Default)]
    struct TestSurface {
        recorder: Recorder,
        viewports: Vec<Viewport>,
        presented: u64,
        last: Option<FrameReport>,
    }

    impl Canvas for TestSurface {
        fn clear(&mut self, color: nebula_core::Color) {
            self.recorder.reset();
            self.recorder.clear(color);
        }
        fn fill_circle(&mut self, center: nebula_core::Point, style: nebula_core::NodeStyle) {
            self.recorder.fill_circle(center, style);
        }
        fn stroke_polyline(&mut self, points: &[nebula_core::Point], stroke: nebula_core::Stroke) {
            self.recorder.stroke_polyline(points, stroke);
        }
    }

    impl Surface for TestSurface {
        fn resize(&mut self, viewport: Viewport) {
            self.viewports.push(viewport);
        }
        fn present(&mut self, report: &FrameReport) {
            self.presented += 1;
            self.last = Some(report.clone());
        }
    }

    fn fragments(n: usize) -> Snapshot {
        Arc::new(
            (0..n)
                .map(|i| Fragment {
                    id: format!("frag-{i}"),
                    content: format!("idea number {i}"),
                    created_at: i as i64,
                })
                .collect(),
        )
    }

    fn settings(max_frames: Option<u64>) -> ViewSettings {
        ViewSettings {
            frame_period: Duration::from_millis(1),
            policy: GlimmerPolicy::Reset,
            max_frames,
        }
    }

    fn view(
        snapshot: Snapshot,
        max_frames: Option<u64>,
    ) -> (
        FieldView<TestSurface>,
        watch::Sender<Snapshot>,
        watch::Sender<Interaction>,
    ) {
        let (feed_tx, feed_rx) = watch::channel(snapshot);
        let (ix_tx, ix_rx) = watch::channel(Interaction::default());
        let view = FieldView::new(TestSurface::default(), feed_rx, ix_rx, settings(max_frames));
        (view, feed_tx, ix_tx)
    }

    #[tokio::test]
    async fn test_runs_frame_limit_then_stops() {
        let (mut view, _feed, _ix) = view(fragments(4), Some(5));
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        view.finished().await.unwrap();

        assert!(!view.is_running());
        assert_eq!(view.frames(), 5);
        let surface = view.surface().unwrap();
        assert_eq!(surface.presented, 5);
        assert_eq!(surface.last.as_ref().unwrap().drawn, 4);
        assert!(matches!(surface.recorder.commands[0], DrawCommand::Clear(_)));
    }

    #[tokio::test]
    async fn test_unmount_stops_chain() {
        let (mut view, _feed, _ix) = view(fragments(2), None);
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        assert!(view.is_running());
        tokio::time::sleep(Duration::from_millis(20)).await;
        view.unmount().await.unwrap();

        assert!(!view.is_running());
        let frames = view.frames();
        assert!(frames > 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(view.frames(), frames, "no frames after unmount");
        assert_eq!(view.surface().unwrap().presented, frames);
    }

    #[tokio::test]
    async fn test_resize_replaces_chain() {
        let (mut view, _feed, _ix) = view(fragments(3), None);
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        view.resize(Viewport::new(120.0, 40.0)).await.unwrap();
        assert!(view.is_running());
        tokio::time::sleep(Duration::from_millis(10)).await;
        view.unmount().await.unwrap();

        let surface = view.surface().unwrap();
        assert_eq!(
            surface.viewports,
            vec![Viewport::new(80.0, 24.0), Viewport::new(120.0, 40.0)]
        );
        assert_eq!(surface.presented, view.frames());
    }

    #[tokio::test]
    async fn test_feed_update_reaches_next_frame() {
        let (mut view, feed, _ix) = view(fragments(1), None);
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        feed.send_replace(fragments(6));
        tokio::time::sleep(Duration::from_millis(30)).await;
        view.unmount().await.unwrap();
        assert_eq!(view.surface().unwrap().last.as_ref().unwrap().drawn, 6);
    }

    #[tokio::test]
    async fn test_interaction_is_read_each_tick() {
        let (mut view, _feed, ix) = view(fragments(3), None);
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        ix.send_modify(|ix| ix.set_search("number 1"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        view.unmount().await.unwrap();

        let dimmed = nebula_core::constants::DIMMED;
        let surface = view.surface().unwrap();
        let dark = surface
            .recorder
            .circles()
            .filter(|(_, s)| s.color == dimmed)
            .count();
        assert_eq!(dark, 2);
    }

    #[tokio::test]
    async fn test_resize_moves_existing_nodes() {
        let (mut view, _feed, _ix) = view(fragments(3), Some(1));
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        view.finished().await.unwrap();

        let wide = Viewport::new(200.0, 50.0);
        view.resize(wide).await.unwrap();
        view.unmount().await.unwrap();

        let field = view.field().unwrap();
        assert_eq!(field.viewport(), wide);
        assert_eq!(field.len(), 3);
        for node in field.nodes() {
            assert_eq!(node.position, nebula_core::place(&node.id, wide));
        }
    }

    #[tokio::test]
    async fn test_remount_picks_up_feed_sent_while_parked() {
        let (mut view, feed, _ix) = view(fragments(2), Some(1));
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        view.finished().await.unwrap();

        feed.send_replace(fragments(5));
        view.mount(Viewport::new(80.0, 24.0)).await.unwrap();
        view.finished().await.unwrap();
        assert_eq!(view.surface().unwrap().last.as_ref().unwrap().drawn, 5);
    }
}
