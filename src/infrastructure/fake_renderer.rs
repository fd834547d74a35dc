use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;

use crate::application::{AppError, AppResult, PageRenderer, RenderSession};
use crate::domain::BrowserCookie;

/// Deterministic render capability for tests: serves scripted frames,
/// records the session's actions, and can be told to fail at specific
/// steps. Also tracks how many sessions are open at once, which is how
/// the gate bound is asserted.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    frames: Mutex<VecDeque<DynamicImage>>,
    default_frame: Mutex<Option<DynamicImage>>,
    capture_delay: Mutex<Duration>,
    fail_captures: AtomicBool,
    fail_cookie_injection: AtomicBool,
    fail_selector_waits: AtomicBool,
    open_sessions: AtomicUsize,
    max_open_sessions: AtomicUsize,
    cookies_seen: Mutex<Vec<BrowserCookie>>,
    actions: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame; each capture pops one. When the queue is empty the
    /// default frame (if any) is served instead.
    pub fn push_frame(&self, frame: DynamicImage) {
        self.inner
            .frames
            .lock()
            .expect("frames lock")
            .push_back(frame);
    }

    pub fn set_default_frame(&self, frame: DynamicImage) {
        *self.inner.default_frame.lock().expect("default frame lock") = Some(frame);
    }

    pub fn set_capture_delay(&self, delay: Duration) {
        *self.inner.capture_delay.lock().expect("delay lock") = delay;
    }

    pub fn set_fail_captures(&self, fail: bool) {
        self.inner.fail_captures.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_cookie_injection(&self, fail: bool) {
        self.inner.fail_cookie_injection.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_selector_waits(&self, fail: bool) {
        self.inner.fail_selector_waits.store(fail, Ordering::SeqCst);
    }

    /// High-water mark of simultaneously open sessions.
    pub fn max_open_sessions(&self) -> usize {
        self.inner.max_open_sessions.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    pub fn cookies_seen(&self) -> Vec<BrowserCookie> {
        self.inner.cookies_seen.lock().expect("cookies lock").clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.inner.actions.lock().expect("actions lock").clone()
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn open(&self, _viewport_width: u32, _max_height: u32) -> AppResult<Box<dyn RenderSession>> {
        let open = self.inner.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .max_open_sessions
            .fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            inner: self.inner.clone(),
        }))
    }
}

struct FakeSession {
    inner: Arc<Inner>,
}

impl FakeSession {
    fn record(&self, action: impl Into<String>) {
        self.inner
            .actions
            .lock()
            .expect("actions lock")
            .push(action.into());
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.record(format!("navigate {url}"));
        Ok(())
    }

    async fn inject_cookies(&self, cookies: &[BrowserCookie]) -> AppResult<()> {
        if self.inner.fail_cookie_injection.load(Ordering::SeqCst) {
            return Err(AppError::Render("cookie injection refused".into()));
        }
        self.record(format!("inject_cookies x{}", cookies.len()));
        self.inner
            .cookies_seen
            .lock()
            .expect("cookies lock")
            .extend(cookies.iter().cloned());
        Ok(())
    }

    async fn reload(&self) -> AppResult<()> {
        self.record("reload");
        Ok(())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> AppResult<()> {
        if self.inner.fail_selector_waits.load(Ordering::SeqCst) {
            return Err(AppError::Render(format!(
                "timed out waiting for selector {selector}"
            )));
        }
        self.record(format!("wait_for {selector}"));
        Ok(())
    }

    async fn fill(&self, selector: &str, _text: &str) -> AppResult<()> {
        self.record(format!("fill {selector}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> AppResult<()> {
        self.record(format!("click {selector}"));
        Ok(())
    }

    async fn capture(&self) -> AppResult<DynamicImage> {
        let delay = *self.inner.capture_delay.lock().expect("delay lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.inner.fail_captures.load(Ordering::SeqCst) {
            return Err(AppError::Render("simulated render timeout".into()));
        }
        let queued = self.inner.frames.lock().expect("frames lock").pop_front();
        match queued.or_else(|| {
            self.inner
                .default_frame
                .lock()
                .expect("default frame lock")
                .clone()
        }) {
            Some(frame) => Ok(frame),
            None => Err(AppError::Render("fake renderer has no frame to serve".into())),
        }
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
