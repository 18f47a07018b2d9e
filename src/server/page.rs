//! HTML for the review UI. The page talks to the JSON endpoints with `fetch`.

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Lab report extractor</title>
<style>
  body { font-family: sans-serif; margin: 2rem; }
  .panes { display: flex; gap: 1.5rem; }
  .panes > div { flex: 1; }
  iframe { width: 100%; height: 80vh; border: 1px solid #ccc; }
  table { border-collapse: collapse; width: 100%; }
  td, th { border: 1px solid #ccc; padding: 0.3rem; }
  td[contenteditable] { background: #fffef5; }
  .error { color: #b00020; }
</style>
</head>
<body>
<h1>Lab report extractor</h1>
"#;

const LOGIN: &str = r#"<form method="post" action="/login">
  <label>Password <input type="password" name="password" autofocus></label>
  <button type="submit">Log in</button>
</form>
</body>
</html>
"#;

const APP: &str = r#"<form method="post" action="/logout"><button type="submit">Log out</button></form>
<form id="upload">
  <input type="file" name="file" accept="application/pdf" required>
  <button type="submit">Process</button>
  <span id="status"></span>
</form>
<div class="panes">
  <div><iframe id="preview" title="Uploaded report"></iframe></div>
  <div>
    <table id="grid"></table>
    <p>
      <button id="add-row">Add row</button>
      <button id="save">Save edits</button>
      <a href="/download">Download CSV</a>
    </p>
  </div>
</div>
<script>
const statusEl = document.getElementById('status');

function render(table) {
  const grid = document.getElementById('grid');
  grid.innerHTML = '';
  const head = grid.insertRow();
  for (const h of table.headers) {
    const th = document.createElement('th');
    th.textContent = h;
    head.appendChild(th);
  }
  for (const row of table.rows) {
    const tr = grid.insertRow();
    for (const cell of row) {
      const td = tr.insertCell();
      td.contentEditable = 'true';
      td.textContent = cell;
    }
  }
}

function collect() {
  const rows = [...document.getElementById('grid').rows];
  const headers = [...rows[0].cells].map(c => c.textContent);
  return { headers, rows: rows.slice(1).map(r => [...r.cells].map(c => c.textContent)) };
}

async function call(method, url, body) {
  const res = await fetch(url, body === undefined ? { method } : {
    method, headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body)
  });
  const data = await res.json();
  if (!res.ok) throw new Error(data.error ? data.error.message : res.statusText);
  return data;
}

document.getElementById('upload').addEventListener('submit', async (e) => {
  e.preventDefault();
  statusEl.textContent = 'Processing...';
  statusEl.className = '';
  try {
    const res = await fetch('/upload', { method: 'POST', body: new FormData(e.target) });
    const data = await res.json();
    if (!res.ok) throw new Error(data.error ? data.error.message : res.statusText);
    render(data.table);
    document.getElementById('preview').src = '/document?' + Date.now();
    statusEl.textContent = data.records + ' results';
  } catch (err) {
    statusEl.textContent = err.message;
    statusEl.className = 'error';
  }
});

document.getElementById('add-row').addEventListener('click', async () => {
  render(await call('POST', '/table/rows'));
});

document.getElementById('save').addEventListener('click', async () => {
  render(await call('PUT', '/table', collect()));
  statusEl.textContent = 'Saved';
});
</script>
</body>
</html>
"#;

pub fn render(logged_in: bool) -> String {
    let body = if logged_in { APP } else { LOGIN };
    format!("{}{}", HEAD, body)
}
