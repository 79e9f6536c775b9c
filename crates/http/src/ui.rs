//! Embedded dashboard page served at `/`.

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>pilot-mem</title>
<style>
  body { font-family: ui-monospace, monospace; background: #14161a; color: #d8dee9;
         margin: 2rem auto; max-width: 64rem; }
  h1 { color: #88c0d0; font-size: 1.2rem; }
  .entry { border-left: 2px solid #4c566a; padding: .3rem .8rem; margin: .4rem 0; }
  .type { color: #ebcb8b; }
  #status { color: #a3be8c; }
</style>
</head>
<body>
<h1>pilot-mem</h1>
<div id="status">connecting&hellip;</div>
<div id="feed"></div>
<script>
  const feed = document.getElementById('feed');
  const status = document.getElementById('status');
  const source = new EventSource('/stream');
  source.onmessage = (msg) => {
    const event = JSON.parse(msg.data);
    if (event.type === 'processing_status') {
      status.textContent = `processing: ${event.active} | queue: ${event.queue_depth}`;
      return;
    }
    if (event.type === 'new_observation') {
      const div = document.createElement('div');
      div.className = 'entry';
      const obs = event.observation;
      div.innerHTML = `<span class="type">[${obs.observation_type}]</span> ${obs.title}`;
      feed.prepend(div);
    }
  };
  source.onerror = () => { status.textContent = 'disconnected'; };
</script>
</body>
</html>
"#;

pub async fn serve_dashboard() -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/html; charset=utf-8")], Html(DASHBOARD_HTML))
        .into_response()
}
