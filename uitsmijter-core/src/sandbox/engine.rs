//! QuickJS-backed execution of a single provider script.
//!
//! A provider script defines a class whose constructor receives the login
//! payload (exposed as the global `input`) and must call `commit(ok, extras?)`
//! before returning. The constructed instance is expected on
//! `globalThis.__instance` — the harness reads `PROVIDER_GETTERS` off it once
//! the script has run to completion.

use std::time::Instant;

use rquickjs::{CatchResultExt, Context, Ctx, Function, Object, Runtime, Value as JsValue};

// self
use crate::{_prelude::*, domain::payload::ProfileValue, sandbox::{SandboxError, SandboxOutput}};

/// Memory ceiling for a single script's QuickJS runtime, per §4.E isolation.
const MEMORY_LIMIT_BYTES: usize = 32 * 1024 * 1024;

#[derive(Default)]
struct Commit {
	ok: bool,
	extras: Option<serde_json::Value>,
}

/// One QuickJS runtime, reused across script invocations for a provider.
///
/// Not [`Clone`]: callers hold one engine per concurrently-executing script.
pub struct ScriptEngine {
	runtime: Runtime,
}

impl ScriptEngine {
	/// Builds a fresh engine with a bounded heap and no module loader (no
	/// `import`/`require`, per §4.E isolation).
	pub fn new() -> Result<Self, SandboxError> {
		let runtime = Runtime::new().map_err(|e| SandboxError::ScriptError { message: e.to_string() })?;

		runtime.set_memory_limit(MEMORY_LIMIT_BYTES);

		Ok(Self { runtime })
	}

	/// Runs `script` against `input`, bounding it to `timeout` wall-clock.
	///
	/// The QuickJS interpreter has no native async cancellation, so the
	/// budget is enforced with an interrupt handler that polls the deadline
	/// and the evaluation itself runs on a blocking thread.
	pub async fn execute(
		self,
		input: serde_json::Value,
		script: String,
		timeout: Duration,
	) -> Result<SandboxOutput, SandboxError> {
		let deadline = Instant::now() + timeout.unsigned_abs();

		tokio::task::spawn_blocking(move || self.execute_blocking(&input, &script, deadline))
			.await
			.map_err(|e| SandboxError::ScriptError { message: e.to_string() })?
	}

	fn execute_blocking(
		self,
		input: &serde_json::Value,
		script: &str,
		deadline: Instant,
	) -> Result<SandboxOutput, SandboxError> {
		self.runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));

		let context =
			Context::full(&self.runtime).map_err(|e| SandboxError::ScriptError { message: e.to_string() })?;

		let commit = Arc::new(RwLock::new(None::<Commit>));
		let commit_for_closure = commit.clone();

		let outcome: rquickjs::Result<HashMap<String, serde_json::Value>> = context.with(|ctx| {
			install_globals(&ctx, input, commit_for_closure)?;

			ctx.eval::<(), _>(script.as_bytes())?;

			let getters = read_getters(&ctx)?;

			Ok(getters)
		});

		let getters = outcome.catch(&context).map_err(|e| {
			if Instant::now() >= deadline {
				SandboxError::Timeout
			} else {
				SandboxError::ScriptError { message: e.to_string() }
			}
		})?;

		let committed = commit.read().clone();

		Ok(SandboxOutput {
			committed: committed.is_some(),
			ok: committed.as_ref().map(|c| c.ok).unwrap_or(false),
			extras: committed.and_then(|c| c.extras).map(ProfileValue::from),
			getters: getters.into_iter().map(|(k, v)| (k, ProfileValue::from(v))).collect(),
		})
	}
}

impl Clone for Commit {
	fn clone(&self) -> Self {
		Self { ok: self.ok, extras: self.extras.clone() }
	}
}

fn install_globals<'js>(
	ctx: &Ctx<'js>,
	input: &serde_json::Value,
	commit_slot: Arc<RwLock<Option<Commit>>>,
) -> rquickjs::Result<()> {
	let globals = ctx.globals();

	let commit_fn = Function::new(ctx.clone(), move |ok: bool, extras: Option<JsValue<'_>>| {
		let extras = extras.and_then(|v| js_to_json(&v).ok());

		*commit_slot.write() = Some(Commit { ok, extras });
	})?;
	globals.set("commit", commit_fn)?;

	let console = Object::new(ctx.clone())?;
	console.set(
		"log",
		Function::new(ctx.clone(), |msg: String| {
			#[cfg(feature = "tracing")]
			tracing::debug!(sandbox_log = %msg, "provider script log");
			#[cfg(not(feature = "tracing"))]
			{
				let _ = msg;
			}
		})?,
	)?;
	globals.set("console", console)?;

	let input_raw = serde_json::to_string(input).map_err(|_| rquickjs::Error::Unknown)?;
	let input_js: JsValue = ctx.json_parse(input_raw)?;
	globals.set("input", input_js)?;

	Ok(())
}

fn read_getters<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<HashMap<String, serde_json::Value>> {
	let globals = ctx.globals();
	let Ok(instance) = globals.get::<_, Object>("__instance") else {
		return Ok(HashMap::new());
	};

	let mut out = HashMap::new();

	for name in crate::sandbox::PROVIDER_GETTERS {
		if let Ok(value) = instance.get::<_, JsValue>(name) {
			if let Ok(json) = js_to_json(&value) {
				out.insert(name.to_owned(), json);
			}
		}
	}

	Ok(out)
}

fn js_to_json(value: &JsValue<'_>) -> rquickjs::Result<serde_json::Value> {
	let ctx = value.ctx();
	let json_str: String = ctx.json_stringify(value.clone())?.map(|s| s.to_string()).transpose()?.unwrap_or_default();

	serde_json::from_str(&json_str).map_err(|_| rquickjs::Error::Unknown)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn script_committing_true_reports_passed() {
		let engine = ScriptEngine::new().expect("engine should build");
		let script = r#"
			class Provider {
				constructor(input) {
					this.canLogin = input.username === "cee8esh5";
					commit(this.canLogin);
				}
			}
			globalThis.__instance = new Provider(input);
		"#;

		let output = engine
			.execute(serde_json::json!({ "username": "cee8esh5" }), script.to_owned(), Duration::seconds(5))
			.await
			.expect("script should run");

		assert!(output.passed());
		assert_eq!(output.getters.get("canLogin").and_then(|v| v.as_str()), None);
	}

	#[tokio::test]
	async fn script_that_never_commits_is_not_passed() {
		let engine = ScriptEngine::new().expect("engine should build");
		let script = "globalThis.__instance = {};";

		let output = engine
			.execute(serde_json::json!({}), script.to_owned(), Duration::seconds(5))
			.await
			.expect("script should run");

		assert!(!output.passed());
	}

	#[tokio::test]
	async fn infinite_loop_times_out() {
		let engine = ScriptEngine::new().expect("engine should build");
		let script = "while (true) {}";

		let result = engine.execute(serde_json::json!({}), script.to_owned(), Duration::milliseconds(200)).await;

		assert!(matches!(result, Err(SandboxError::Timeout)));
	}
}
