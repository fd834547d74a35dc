use std::time::Duration;

use async_trait::async_trait;
use fantoccini::cookies::Cookie;
use fantoccini::{Client, ClientBuilder, Locator};
use image::DynamicImage;
use serde_json::json;

use crate::application::{AppError, AppResult, PageRenderer, RenderSession};
use crate::domain::BrowserCookie;

/// Render capability backed by a WebDriver endpoint (chromedriver).
/// One `open` equals one WebDriver session, so the concurrency gate
/// translates directly into a bound on live browser pages.
pub struct WebDriverRenderer {
    webdriver_url: String,
}

impl WebDriverRenderer {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
        }
    }
}

#[async_trait]
impl PageRenderer for WebDriverRenderer {
    async fn open(&self, viewport_width: u32, max_height: u32) -> AppResult<Box<dyn RenderSession>> {
        let mut caps = serde_json::map::Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": [
                    "--headless=new",
                    "--disable-gpu",
                    "--no-sandbox",
                    "--disable-dev-shm-usage",
                ]
            }),
        );

        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);
        let mut client = builder
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| AppError::Render(format!("webdriver connect: {e}")))?;

        // initial height is a placeholder; capture() resizes to the
        // measured page height
        client
            .set_window_size(viewport_width, 1080)
            .await
            .map_err(cmd_err)?;

        Ok(Box::new(WebDriverSession {
            client,
            viewport_width,
            max_height,
        }))
    }
}

struct WebDriverSession {
    client: Client,
    viewport_width: u32,
    max_height: u32,
}

impl WebDriverSession {
    /// Clones of a fantoccini client share the underlying browser
    /// session; handing each command its own handle keeps the session
    /// usable behind the `&self` port methods.
    fn handle(&self) -> Client {
        self.client.clone()
    }

    async fn page_height(&self) -> Option<u32> {
        let mut client = self.handle();
        let value = client
            .execute("return document.body.scrollHeight", vec![])
            .await
            .ok()?;
        value.as_u64().map(|h| h as u32)
    }
}

#[async_trait]
impl RenderSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.handle().goto(url).await.map_err(cmd_err)
    }

    async fn inject_cookies(&self, cookies: &[BrowserCookie]) -> AppResult<()> {
        let mut client = self.handle();
        for c in cookies {
            let mut cookie = Cookie::new(c.name.clone(), c.value.clone());
            if let Some(domain) = &c.domain {
                cookie.set_domain(domain.clone());
            }
            cookie.set_path(c.path.clone().unwrap_or_else(|| "/".to_string()));
            if let Some(epoch) = c.expiry_epoch {
                if let Ok(at) = time::OffsetDateTime::from_unix_timestamp(epoch) {
                    cookie.set_expires(at);
                }
            }
            client.add_cookie(cookie).await.map_err(cmd_err)?;
        }
        Ok(())
    }

    async fn reload(&self) -> AppResult<()> {
        self.handle().refresh().await.map_err(cmd_err)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> AppResult<()> {
        let mut client = self.handle();
        client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map(|_| ())
            .map_err(cmd_err)
    }

    async fn fill(&self, selector: &str, text: &str) -> AppResult<()> {
        let mut client = self.handle();
        let mut element = client
            .find(Locator::Css(selector))
            .await
            .map_err(cmd_err)?;
        element.send_keys(text).await.map_err(cmd_err)
    }

    async fn click(&self, selector: &str) -> AppResult<()> {
        let mut client = self.handle();
        let mut element = client
            .find(Locator::Css(selector))
            .await
            .map_err(cmd_err)?;
        element.click().await.map_err(cmd_err)
    }

    /// Full-page capture: measure the document height, clamp it to the
    /// configured cap, resize the window to match, then screenshot.
    async fn capture(&self) -> AppResult<DynamicImage> {
        let height = self.page_height().await.unwrap_or(1080).min(self.max_height);
        let mut client = self.handle();
        client
            .set_window_size(self.viewport_width, height.max(200))
            .await
            .map_err(cmd_err)?;

        let png = client.screenshot().await.map_err(cmd_err)?;
        image::load_from_memory(&png)
            .map_err(|e| AppError::Render(format!("decode screenshot: {e}")))
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.client.close().await.map_err(cmd_err)
    }
}

fn cmd_err(e: fantoccini::error::CmdError) -> AppError {
    AppError::Render(e.to_string())
}
