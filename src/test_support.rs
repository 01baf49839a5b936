//! Test report infrastructure for unit and integration tests.
//!
//! TestReport records setup/action/assert steps and, when
//! `TEST_REPORT_DIR` is set, writes one plain-text report file per
//! test. Assertions delegate to the std macros so failures still panic
//! normally.

use std::fmt::{Debug, Display};
use std::path::PathBuf;
use std::sync::Mutex;

/// Auto-detect the test name from the calling function.
/// Works for both sync and async test functions.
#[macro_export]
macro_rules! test_report {
    ($title:expr) => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        // Strip "::f" suffix
        let name = &name[..name.len() - 3];
        // In async fns, the path ends with "::{{closure}}" — strip that too
        let name = name.strip_suffix("::{{closure}}").unwrap_or(name);
        $crate::test_support::TestReport::new(name, $title, file!(), line!())
    }};
}

pub struct TestReport {
    full_path: String,
    title: String,
    source: String,
    lines: Mutex<Vec<String>>,
}

impl TestReport {
    pub fn new(full_path: &str, title: &str, source_file: &str, source_line: u32) -> Self {
        Self {
            full_path: full_path.to_string(),
            title: title.to_string(),
            source: format!("{}:{}", source_file, source_line),
            lines: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    fn clip(value: impl Debug) -> String {
        let s = format!("{:?}", value);
        if s.len() <= 1000 {
            format!("`{}`", s)
        } else {
            format!("`{}…` ({} bytes)", &s[..1000], s.len())
        }
    }

    #[allow(dead_code)]
    pub fn setup(&self, msg: impl Display) {
        self.push(format!("STEP setup: {}", msg));
    }

    #[allow(dead_code)]
    pub fn action(&self, msg: impl Display) {
        self.push(format!("STEP action: {}", msg));
    }

    #[allow(dead_code)]
    pub fn output(&self, label: &str, text: &str) {
        self.push(format!("STEP output {}: {:?}", label, text));
    }

    pub fn assert_eq<A, E>(&self, label: &str, actual: &A, expected: &E)
    where
        A: PartialEq<E> + Debug,
        E: Debug,
    {
        let pass = actual == expected;
        self.record_assert(
            pass,
            format!("{}: {} == {}", label, Self::clip(actual), Self::clip(expected)),
        );
        assert_eq!(actual, expected, "{}", label);
    }

    pub fn assert_true(&self, label: &str, value: bool) {
        self.record_assert(value, format!("{}: `{}`", label, value));
        assert!(value, "{}", label);
    }

    #[allow(dead_code)]
    pub fn assert_contains(&self, label: &str, haystack: &str, needle: &str) {
        let pass = haystack.contains(needle);
        self.record_assert(
            pass,
            format!(
                "{}: {} contains {}",
                label,
                Self::clip(haystack),
                Self::clip(needle)
            ),
        );
        assert!(
            pass,
            "{}: {:?} does not contain {:?}",
            label, haystack, needle
        );
    }

    fn record_assert(&self, pass: bool, msg: String) {
        if pass {
            self.push(format!("STEP assert_pass: {}", msg));
        } else {
            self.push(format!("STEP assert_fail: {}", msg));
        }
    }

    fn write_report(&self) {
        let Ok(dir) = std::env::var("TEST_REPORT_DIR") else {
            return;
        };
        let dir = PathBuf::from(dir);

        let name = self.full_path.rsplit("::").next().unwrap_or(&self.full_path);
        let result = if std::thread::panicking() {
            "fail"
        } else {
            "pass"
        };

        let mut out = Vec::new();
        out.push(format!("NAME: {}", name));
        out.push(format!("TITLE: {}", self.title));
        out.push(format!("SOURCE: {}", self.source));
        out.extend(self.lines.lock().unwrap().iter().cloned());
        out.push(format!("RESULT: {}", result));
        out.push(String::new());

        let file = dir.join(format!("{}.txt", self.full_path.replace("::", "__")));
        let _ = std::fs::create_dir_all(&dir);
        let _ = std::fs::write(file, out.join("\n"));
    }
}

impl Drop for TestReport {
    fn drop(&mut self) {
        self.write_report();
    }
}
