use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

const STYLESHEET: &str = "https://cdn.simplecss.org/simple.min.css";

/// Keep the viewport pinned to the bottom while output streams in; stop the
/// moment the user scrolls on their own.
const SCROLL_SCRIPT: &str = "const autoScroll = setInterval(() => { window.scrollTo(0, document.body.scrollHeight); }, 17);\
window.addEventListener('wheel', () => { clearInterval(autoScroll); });\
window.addEventListener('touchmove', () => { clearInterval(autoScroll); });";

/// Streaming markup writer feeding an HTTP response body chunk by chunk.
///
/// Element emission is a fixed, enumerated set of methods; nested elements
/// are scoped guards whose drop emits the closing tag on every exit path,
/// early returns included. Writes after the client has gone away report
/// `false` so producers can stop early.
pub struct Page {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl Page {
    pub fn channel() -> (Page, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Page { tx }, rx)
    }

    /// Write raw markup. Returns false once the receiving side is gone.
    pub fn raw(&self, markup: &str) -> bool {
        self.tx.send(Bytes::copy_from_slice(markup.as_bytes())).is_ok()
    }

    /// Write HTML-escaped text content.
    pub fn text(&self, content: &str) -> bool {
        self.raw(&escape(content))
    }

    /// Write process output as escaped text (lossy utf-8).
    pub fn text_bytes(&self, content: &[u8]) -> bool {
        self.text(&String::from_utf8_lossy(content))
    }

    /// Open the page skeleton; the guard closes body and html on drop.
    pub fn document(&self) -> Document<'_> {
        self.raw("<html><head>");
        self.raw(&format!("<link rel=\"stylesheet\" href=\"{STYLESHEET}\" />"));
        self.raw("</head><body>");
        Document { page: self }
    }

    pub fn table(&self) -> Tag<'_> {
        self.open("table", None)
    }

    pub fn thead(&self) -> Tag<'_> {
        self.open("thead", None)
    }

    pub fn tbody(&self) -> Tag<'_> {
        self.open("tbody", None)
    }

    pub fn tr(&self) -> Tag<'_> {
        self.open("tr", None)
    }

    pub fn th(&self) -> Tag<'_> {
        self.open("th", None)
    }

    pub fn td(&self) -> Tag<'_> {
        self.open("td", None)
    }

    pub fn code(&self) -> Tag<'_> {
        self.open("code", None)
    }

    pub fn footer(&self) -> Tag<'_> {
        self.open("footer", None)
    }

    pub fn pre(&self, style: &str) -> Tag<'_> {
        self.open("pre", Some(&format!("style=\"{}\"", escape(style))))
    }

    pub fn a(&self, href: &str, style: &str) -> Tag<'_> {
        let mut attrs = format!("href=\"{}\"", escape(href));
        if !style.is_empty() {
            attrs.push_str(&format!(" style=\"{}\"", escape(style)));
        }
        self.open("a", Some(&attrs))
    }

    fn open(&self, name: &'static str, attrs: Option<&str>) -> Tag<'_> {
        match attrs {
            Some(attrs) => self.raw(&format!("<{name} {attrs}>")),
            None => self.raw(&format!("<{name}>")),
        };
        Tag { page: self, name }
    }

    pub fn with_scroll(&self) -> bool {
        self.raw(&format!("<script>{SCROLL_SCRIPT}</script>"))
    }

    /// Announce the redirect target in a footer, give the reader a moment,
    /// then navigate.
    pub async fn redirect_after(&self, url: &str) {
        {
            let _footer = self.footer();
            self.raw(&format!(
                "Redirecting to <a href=\"{0}\">{0}</a>...",
                escape(url)
            ));
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.raw(&format!(
            "<script>window.addEventListener('load', () => {{ window.location.href = '{}'; }});</script>",
            escape(url)
        ));
    }
}

/// Scoped open tag; emits the matching close tag on drop.
pub struct Tag<'a> {
    page: &'a Page,
    name: &'static str,
}

impl Drop for Tag<'_> {
    fn drop(&mut self) {
        let _ = self.page.raw(&format!("</{}>", self.name));
    }
}

/// Scoped html/head/body skeleton.
pub struct Document<'a> {
    page: &'a Page,
}

impl Drop for Document<'_> {
    fn drop(&mut self) {
        let _ = self.page.raw("</body></html>");
    }
}

pub fn escape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests;
