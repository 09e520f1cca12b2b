//! Embedded HTML dashboard.

use axum::response::Html;

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>pulsecast dashboard</title>
    <style>
        body { font-family: sans-serif; max-width: 640px; margin: 2rem auto; }
        .metric { margin: 0.5rem 0; }
        .metric span { font-weight: bold; }
    </style>
</head>
<body>
    <h1>pulsecast</h1>
    <div class="metric">Messages received: <span id="count">0</span></div>
    <div class="metric">Last latency: <span id="latency">-</span></div>
    <div class="metric">SSE clients: <span id="sse">0</span></div>
    <div class="metric">WS clients: <span id="ws">0</span></div>
    <div class="metric">Messages sent: <span id="sent">0</span></div>
    <div class="metric">Uptime: <span id="uptime">0</span>s</div>
    <button id="reset">Reset stats</button>
    <script>
        let count = 0;
        const es = new EventSource('/sse');
        es.onmessage = event => {
            const data = JSON.parse(event.data);
            document.getElementById('count').textContent = ++count;
            document.getElementById('latency').textContent = (Date.now() - data.ts) + 'ms';
        };

        async function refreshStats() {
            const res = await fetch('/api/stats');
            const stats = await res.json();
            document.getElementById('sse').textContent = stats.sseClients;
            document.getElementById('ws').textContent = stats.wsClients;
            document.getElementById('sent').textContent = stats.messagesSent;
            document.getElementById('uptime').textContent = Math.floor(stats.uptime / 1000);
        }
        setInterval(refreshStats, 2000);
        refreshStats();

        document.getElementById('reset').onclick = async () => {
            await fetch('/api/reset', { method: 'POST' });
            refreshStats();
        };
    </script>
</body>
</html>
"#;

pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}
