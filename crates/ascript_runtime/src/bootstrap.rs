//! JS-side half of the `__safe_*` primitives. The counter/abort checks and
//! the actual tool call live in Rust (see `primitives.rs`); this shim
//! composes them into the surface the rewritten script calls, the same way
//! the console shim in a typical embedded-QuickJS setup layers a JS API
//! over a couple of native hooks.

pub const BOOTSTRAP_JS: &str = r#"
const console = {
  _stringify(args) {
    return args.map((a) => {
      if (typeof a === 'string') return a;
      try { return JSON.stringify(a); } catch (e) { return String(a); }
    }).join(' ');
  },
  log(...args) { __stdout_native(console._stringify(args)); },
  info(...args) { __stdout_native(console._stringify(args)); },
  warn(...args) { __log_native('warn', console._stringify(args)); },
  error(...args) { __log_native('error', console._stringify(args)); },
  debug(...args) { __log_native('debug', console._stringify(args)); },
};

function __safe_forOf(iterable) {
  const source = (iterable && typeof iterable[Symbol.iterator] === 'function')
    ? iterable[Symbol.iterator]()
    : iterable;
  return {
    [Symbol.iterator]() {
      return {
        next() {
          __check_iteration();
          return source.next();
        },
      };
    },
  };
}

function __safe_for(init, test, update, body) {
  for (init ? init() : undefined; test ? test() : true; update ? update() : undefined) {
    __check_iteration();
    body();
  }
}

function __safe_while(test, body) {
  while (test()) {
    __check_iteration();
    body();
  }
}

function __safe_doWhile(body, test) {
  do {
    __check_iteration();
    body();
  } while (test());
}

function __safe_concat(a, b) {
  if (__is_reference_id(a) && __is_reference_id(b)) {
    throw new Error('cannot concatenate two reference identifiers');
  }
  return String(a) + String(b);
}

function __safe_template(quasis, ...exprs) {
  let out = quasis[0];
  for (let i = 0; i < exprs.length; i++) {
    const piece = String(exprs[i]);
    if (__is_reference_id(out) && __is_reference_id(piece)) {
      throw new Error('cannot interpolate a reference identifier next to another');
    }
    out = out + piece + quasis[i + 1];
  }
  return out;
}

async function __safe_callTool(name, args) {
  if (typeof name !== 'string' || name.length === 0) {
    throw new Error('callTool: name must be a non-empty string');
  }
  if (typeof args !== 'object' || args === null || Array.isArray(args)) {
    throw new Error('callTool: args must be an object');
  }
  const resultJson = await __call_tool_native(name, JSON.stringify(args));
  const parsed = JSON.parse(resultJson);
  if (parsed && parsed.__limitExceeded) {
    throw new Error(parsed.message);
  }
  return parsed;
}

async function __safe_parallel(fns, opts) {
  const requested = (opts && opts.maxConcurrency) || fns.length || 1;
  const maxConcurrency = Math.max(1, Math.min(requested, 100, fns.length || 1));
  const results = new Array(fns.length);
  const failures = [];
  let nextIndex = 0;

  async function worker() {
    for (;;) {
      __check_abort();
      const i = nextIndex++;
      if (i >= fns.length) return;
      try {
        results[i] = await fns[i]();
      } catch (e) {
        failures.push({ index: i, message: String((e && e.message) || e) });
      }
    }
  }

  const workers = [];
  for (let i = 0; i < maxConcurrency; i++) {
    workers.push(worker());
  }
  await Promise.all(workers);

  if (failures.length > 0) {
    throw new Error(`${failures.length} of ${fns.length} parallel tasks failed: ` + JSON.stringify(failures));
  }
  return results;
}
"#;
