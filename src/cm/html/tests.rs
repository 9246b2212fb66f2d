use super::*;

fn collect(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> String {
    let mut out = String::new();
    while let Ok(chunk) = rx.try_recv() {
        out.push_str(&String::from_utf8_lossy(&chunk));
    }
    out
}

#[test]
fn text_is_escaped() {
    let (page, mut rx) = Page::channel();
    page.text("<b>&\"'</b>");
    drop(page);
    assert_eq!(collect(&mut rx), "&lt;b&gt;&amp;&quot;&#39;&lt;/b&gt;");
}

#[test]
fn nested_tags_close_in_reverse_order() {
    let (page, mut rx) = Page::channel();
    {
        let _table = page.table();
        let _tr = page.tr();
        let _td = page.td();
        page.text("x");
    }
    drop(page);
    assert_eq!(collect(&mut rx), "<table><tr><td>x</td></tr></table>");
}

#[test]
fn tags_close_on_early_return() {
    fn render(page: &Page, fail: bool) -> Result<(), ()> {
        let _pre = page.pre("font-size: 0.9em;");
        if fail {
            page.text("boom");
            return Err(());
        }
        page.text("ok");
        Ok(())
    }

    let (page, mut rx) = Page::channel();
    render(&page, true).unwrap_err();
    drop(page);
    let out = collect(&mut rx);
    assert_eq!(out, "<pre style=\"font-size: 0.9em;\">boom</pre>");
}

#[test]
fn document_emits_skeleton() {
    let (page, mut rx) = Page::channel();
    {
        let _doc = page.document();
        page.text("hello");
    }
    drop(page);
    let out = collect(&mut rx);
    assert!(out.starts_with("<html><head>"));
    assert!(out.contains("simple.min.css"));
    assert!(out.contains("<body>hello"));
    assert!(out.ends_with("</body></html>"));
}

#[test]
fn anchor_escapes_attributes() {
    let (page, mut rx) = Page::channel();
    {
        let _a = page.a("/logs/a\"b", "");
        page.text("Logs");
    }
    drop(page);
    assert_eq!(collect(&mut rx), "<a href=\"/logs/a&quot;b\">Logs</a>");
}

#[test]
fn writes_after_disconnect_report_failure() {
    let (page, rx) = Page::channel();
    drop(rx);
    assert!(!page.text("anyone there?"));
    assert!(!page.raw("<hr/>"));
}

#[tokio::test(start_paused = true)]
async fn redirect_waits_then_navigates() {
    let (page, mut rx) = Page::channel();
    page.redirect_after("https://foo.example.com").await;
    drop(page);
    let out = collect(&mut rx);
    assert!(out.starts_with("<footer>Redirecting to "));
    assert!(out.contains("</footer>"));
    assert!(out.contains("window.location.href"));
}
