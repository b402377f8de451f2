//! HTML pages for the local web surface

/// Landing page: session status, login/logout and console-open controls
pub const INDEX_PAGE_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>AWS Console Federation</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 640px; margin: 40px auto; padding: 0 16px; color: #222; }
  h1 { font-size: 1.3em; }
  .card { border: 1px solid #ddd; border-radius: 8px; padding: 16px; margin: 16px 0; }
  button { padding: 8px 14px; border-radius: 6px; border: 1px solid #888; background: #f5f5f5; cursor: pointer; }
  button.primary { background: #1a73e8; border-color: #1a73e8; color: #fff; }
  input[type=text] { width: 100%; padding: 8px; box-sizing: border-box; margin: 6px 0; }
  .muted { color: #777; font-size: 0.9em; }
  .error { color: #b00020; }
  li { margin: 4px 0; }
</style>
</head>
<body>
<h1>AWS Console Federation</h1>

<div class="card" id="session-card">
  <div id="session-info" class="muted">Loading session…</div>
  <p>
    <button class="primary" id="login-btn" onclick="location.href='/auth/login'">Sign in</button>
    <button id="logout-btn" onclick="logout()" hidden>Sign out</button>
    <button id="refresh-btn" onclick="refreshUser()" hidden>Refresh identity</button>
  </p>
</div>

<div class="card" id="console-card" hidden>
  <strong>Open AWS console</strong>
  <input type="text" id="role-arn" placeholder="arn:aws:iam::123456789012:role/MyRole">
  <button class="primary" onclick="openConsole()">Assume role &amp; open console</button>
  <div id="console-error" class="error"></div>
  <div id="history"></div>
</div>

<script>
async function loadStatus() {
  const status = await (await fetch('/auth/status')).json();
  const info = document.getElementById('session-info');
  const authed = status.authenticated;
  document.getElementById('login-btn').hidden = authed;
  document.getElementById('logout-btn').hidden = !authed;
  document.getElementById('refresh-btn').hidden = !authed;
  document.getElementById('console-card').hidden = !authed;
  if (authed) {
    const who = status.user.name || status.user.preferred_username || status.user.email || status.user.sub;
    info.textContent = 'Signed in as ' + who + ' (expires ' + new Date(status.expiresAt).toLocaleTimeString() + ')';
    loadHistory();
  } else {
    info.textContent = 'Not signed in (' + status.flowState + ')';
  }
}

async function loadHistory() {
  const items = await (await fetch('/console/history')).json();
  const el = document.getElementById('history');
  if (!items.length) { el.innerHTML = ''; return; }
  el.innerHTML = '<p class="muted">Recent roles</p><ul>' + items.map(i =>
    '<li><a href="#" onclick="document.getElementById(\'role-arn\').value=\'' + i.arn + '\';return false">' +
    i.roleName + '</a> <span class="muted">(' + i.accountId + ', used ' + i.useCount + 'x)</span></li>'
  ).join('') + '</ul>';
}

async function logout() {
  const resp = await (await fetch('/auth/logout', {
    method: 'POST',
    headers: {'content-type': 'application/json'},
    body: JSON.stringify({redirectToProvider: true})
  })).json();
  if (resp.redirectUrl) { location.href = resp.redirectUrl; } else { location.reload(); }
}

async function refreshUser() {
  await fetch('/auth/refresh', {method: 'POST'});
  loadStatus();
}

async function openConsole() {
  const errEl = document.getElementById('console-error');
  errEl.textContent = '';
  const resp = await fetch('/console/open', {
    method: 'POST',
    headers: {'content-type': 'application/json'},
    body: JSON.stringify({roleArn: document.getElementById('role-arn').value})
  });
  const body = await resp.json();
  if (resp.ok) { window.open(body.consoleUrl, '_blank'); loadHistory(); }
  else { errEl.textContent = body.error; }
}

loadStatus();
</script>
</body>
</html>
"##;

/// Render the authentication error page
pub fn render_error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Authentication failed</title>
<style>
  body {{ font-family: system-ui, sans-serif; max-width: 640px; margin: 40px auto; padding: 0 16px; }}
  .error {{ border: 1px solid #b00020; border-radius: 8px; padding: 16px; color: #b00020; }}
</style>
</head>
<body>
<h1>Authentication failed</h1>
<div class="error">{}</div>
<p><a href="/">Back</a></p>
</body>
</html>
"#,
        html_escape(error)
    )
}

/// Minimal HTML escaping for error text
fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
