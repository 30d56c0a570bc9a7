use crate::prompt::PromptTemplate;
use crate::validation::DEFAULT_VALIDATION_TEMPLATE;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Company Analysis Tool</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 2rem; display: grid; grid-template-columns: repeat(auto-fit, minmax(22rem, 1fr)); gap: 1.5rem; }
  h1 { grid-column: 1 / -1; margin: 0; }
  textarea { width: 100%; font-family: monospace; }
  label { display: block; margin: .4rem 0; }
  pre { background: #f4f4f4; padding: .75rem; white-space: pre-wrap; }
  .error { color: #b00020; }
</style>
</head>
<body>
<h1>Company Analysis</h1>
<section>
  <h2>Settings</h2>
  <label>API key <input id="api-key" type="password" placeholder="Leave blank to keep current"></label>
  <label>Model <input id="model" value="__MODEL__"></label>
  <label>Max tokens <input id="max-tokens" type="number" min="1" placeholder="1000"></label>
  <label>Temperature <input id="temperature" type="number" min="0" max="2" step="0.1" placeholder="0.7"></label>
  <button onclick="saveSettings()">Save settings</button>
  <button onclick="clearKey()">Clear API key</button>
  <button onclick="clearConfig()">Clear all</button>
  <h3>.env content</h3>
  <textarea id="env" rows="6" placeholder="OPENAI_API_KEY=...&#10;OPENAI_MODEL=gpt-3.5-turbo"></textarea>
  <button onclick="loadEnv()">Load from .env content</button>
  <pre id="config"></pre>
</section>
<section>
  <h2>Prompt</h2>
  <textarea id="prompt" rows="18">__TEMPLATE__</textarea>
  <label>Company name <input id="company" placeholder="Enter company name"></label>
  <button onclick="singleRun()">Single run</button>
  <h3>Output</h3>
  <pre id="output"></pre>
</section>
<section>
  <h2>Batch</h2>
  <input id="file" type="file" accept=".json">
  <button onclick="batchRun()">Run batch</button>
  <p><a href="/batch/export">Download results</a></p>
  <pre id="batch"></pre>
</section>
<section>
  <h2>Validation</h2>
  <label>Input JSON <input id="v-input" type="file" accept=".json"></label>
  <label>Expected JSON <input id="v-expected" type="file" accept=".json"></label>
  <label>Actual JSON <input id="v-actual" type="file" accept=".json"> (defaults to the last batch)</label>
  <textarea id="v-prompt" rows="12">__VALIDATION_TEMPLATE__</textarea>
  <button onclick="validateRun()">Validate</button>
  <p><a href="/validate/export">Download report</a></p>
  <pre id="validation"></pre>
</section>
<script>
async function call(method, url, body) {
  const res = await fetch(url, { method, headers: { "content-type": "application/json" }, body: body && JSON.stringify(body) });
  const json = await res.json();
  if (!res.ok) throw new Error(json.error);
  return json;
}
function show(id, value, failed) {
  const el = document.getElementById(id);
  el.className = failed ? "error" : "";
  el.textContent = typeof value === "string" ? value : JSON.stringify(value, null, 2);
}
async function refresh() { try { show("config", await call("GET", "/config")); } catch (e) { show("config", e.message, true); } }
function value(id) { return document.getElementById(id).value; }
function number(id) { const v = value(id); return v === "" ? undefined : Number(v); }
async function saveSettings() {
  const form = { api_key: value("api-key"), model: value("model") || undefined, max_tokens: number("max-tokens"), temperature: number("temperature") };
  try { show("config", await call("POST", "/config", form)); } catch (e) { show("config", e.message, true); }
}
async function clearKey() { try { show("config", await call("DELETE", "/config/api-key")); } catch (e) { show("config", e.message, true); } }
async function clearConfig() { try { show("config", await call("DELETE", "/config")); } catch (e) { show("config", e.message, true); } }
async function readJson(id) {
  const file = document.getElementById(id).files[0];
  return file ? JSON.parse(await file.text()) : undefined;
}
async function loadEnv() {
  try { await call("POST", "/config/env", { content: document.getElementById("env").value }); refresh(); } catch (e) { show("config", e.message, true); }
}
async function singleRun() {
  show("output", "Generating analysis...");
  try {
    const r = await call("POST", "/analyze", { company: document.getElementById("company").value, prompt: document.getElementById("prompt").value });
    show("output", r.analysis);
  } catch (e) { show("output", e.message, true); }
}
async function batchRun() {
  const file = document.getElementById("file").files[0];
  if (!file) { show("batch", "Choose a JSON file first", true); return; }
  show("batch", "Processing companies...");
  try {
    const r = await call("POST", "/batch", { companies: await file.text(), prompt: document.getElementById("prompt").value });
    show("batch", r);
  } catch (e) { show("batch", e.message, true); }
}
async function validateRun() {
  show("validation", "Validating...");
  try {
    const body = { input: await readJson("v-input"), expected: await readJson("v-expected"), actual: await readJson("v-actual"), prompt: value("v-prompt") };
    show("validation", (await call("POST", "/validate", body)).validation_analysis);
  } catch (e) { show("validation", e.message, true); }
}
refresh();
</script>
</body>
</html>
"#;

pub fn render_index(model: &str) -> String {
    let model = html_escape::encode_double_quoted_attribute(model);
    let template = PromptTemplate::default();
    let template = html_escape::encode_text(template.as_str());
    let validation = html_escape::encode_text(DEFAULT_VALIDATION_TEMPLATE);
    INDEX_HTML
        .replace("__MODEL__", &model)
        .replace("__TEMPLATE__", &template)
        .replace("__VALIDATION_TEMPLATE__", &validation)
}
