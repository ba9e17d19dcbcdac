use crate::{
    driver::{DecodeError, Decoder},
    fixture::{Fixture, FixtureError},
    matcher::{self, Mismatch},
};
use owo_colors::OwoColorize;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Why one fixture did not pass.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Failure {
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Mismatch(#[from] Mismatch),
}

impl Failure {
    /// Fatal failures end the run even with `keep_going`.
    fn is_fatal(&self) -> bool {
        match self {
            Failure::Fixture(_) => true,
            Failure::Decode(err) => err.is_fatal(),
            Failure::Mismatch(_) => false,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Counts {
    pub(crate) total: usize,
    pub(crate) skipped: usize,
    pub(crate) passed: usize,
    pub(crate) failed: usize,
}

impl Counts {
    pub(crate) fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Runs fixtures in order against a decoder, writing diagnostics to `out`.
pub(crate) struct Harness<D, W> {
    decoder: D,
    out: W,
    keep_going: bool,
    verbose: bool,
}

impl<D: Decoder, W: Write> Harness<D, W> {
    pub(crate) fn new(decoder: D, out: W) -> Self {
        Self {
            decoder,
            out,
            keep_going: false,
            verbose: false,
        }
    }

    pub(crate) fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    pub(crate) fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub(crate) fn run(mut self, fixtures: &[PathBuf]) -> std::io::Result<Counts> {
        let mut counts = Counts {
            total: fixtures.len(),
            ..Counts::default()
        };

        for path in fixtures {
            match self.run_one(path) {
                Ok(()) => {
                    counts.passed += 1;
                    if self.verbose {
                        writeln!(self.out, "{} {}", "PASS".green(), path.display())?;
                    }
                }
                Err(failure) => {
                    counts.failed += 1;
                    if self.verbose {
                        writeln!(self.out, "{} {}", "FAIL".red(), path.display())?;
                    }
                    writeln!(self.out, "Error: {}: {failure}", path.display())?;

                    if failure.is_fatal() || !self.keep_going {
                        break;
                    }
                }
            }
        }
        counts.skipped = counts.total - counts.passed - counts.failed;

        if self.verbose {
            self.summary(&counts)?;
        }

        Ok(counts)
    }

    fn run_one(&mut self, path: &Path) -> Result<(), Failure> {
        let fixture = Fixture::load(path)?;
        let observed = self.decoder.decode(&fixture.payload)?;
        matcher::compare(&fixture.expected, &observed)?;
        Ok(())
    }

    fn summary(&mut self, counts: &Counts) -> std::io::Result<()> {
        writeln!(self.out)?;
        if counts.failed > 0 {
            write!(self.out, "{} {}, ", counts.failed.red(), "failed".red())?;
        }
        if counts.skipped > 0 {
            write!(self.out, "{} {}, ", counts.skipped.yellow(), "skipped".yellow())?;
        }
        if counts.passed > 0 {
            write!(self.out, "{} {}, ", counts.passed.green(), "passed".green())?;
        }
        writeln!(self.out, "{} total", counts.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StubDriver;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixtures {
        dir: TempDir,
        paths: Vec<PathBuf>,
    }

    impl Fixtures {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                paths: Vec::new(),
            }
        }

        fn add(mut self, name: &str, contents: serde_json::Value) -> Self {
            let path = self.dir.path().join(name);
            std::fs::write(&path, contents.to_string()).unwrap();
            self.paths.push(path);
            self
        }

        fn error_line(&self, name: &str, message: &str) -> String {
            format!("Error: {}: {message}\n", self.dir.path().join(name).display())
        }
    }

    fn run(stub: &mut StubDriver, fixtures: &Fixtures, keep_going: bool) -> (Counts, String) {
        let mut out = Vec::new();
        let counts = Harness::new(stub, &mut out)
            .keep_going(keep_going)
            .run(&fixtures.paths)
            .unwrap();
        (counts, String::from_utf8(out).unwrap())
    }

    fn ack_fixture() -> serde_json::Value {
        json!({"data": "01020304", "expected": {"type": "ack", "seq": 3}})
    }

    #[test]
    fn extra_observed_fields_pass_silently() {
        let fixtures = Fixtures::new().add("ack.json", ack_fixture());
        let mut stub =
            StubDriver::default().answer("01020304", json!({"type": "ack", "seq": 3, "crc": "ff"}));

        let (counts, out) = run(&mut stub, &fixtures, false);

        assert!(counts.all_passed());
        assert_eq!(counts.passed, 1);
        assert_eq!(out, "");
    }

    #[test]
    fn value_mismatch_fails_the_run() {
        let fixtures = Fixtures::new().add("ack.json", ack_fixture());
        let mut stub =
            StubDriver::default().answer("01020304", json!({"type": "ack", "seq": 4, "crc": "ff"}));

        let (counts, out) = run(&mut stub, &fixtures, false);

        assert!(!counts.all_passed());
        assert_eq!(
            out,
            fixtures.error_line("ack.json", "mismatch at seq: expected 3, found 4")
        );
    }

    #[test]
    fn hexdata_fixture_reports_missing_nested_field() {
        let fixtures = Fixtures::new().add(
            "flags.json",
            json!({"hexdata": "deadbeef", "expected": {"flags": {"ack": true}}}),
        );
        let mut stub = StubDriver::default().answer("deadbeef", json!({"flags": {}}));

        let (counts, out) = run(&mut stub, &fixtures, false);

        assert_eq!(counts.failed, 1);
        assert_eq!(
            out,
            fixtures.error_line("flags.json", "missing flags.ack from result")
        );
        assert_eq!(stub.calls[0].encoding, crate::fixture::Encoding::Hex);
    }

    #[test]
    fn missing_payload_key_stops_before_decoding() {
        let fixtures = Fixtures::new()
            .add("bad.json", json!({"expected": {"x": 1}}))
            .add("ack.json", ack_fixture());
        let mut stub = StubDriver::default().answer("01020304", json!({"type": "ack", "seq": 3}));

        let (counts, out) = run(&mut stub, &fixtures, true);

        assert!(stub.calls.is_empty());
        assert_eq!(
            counts,
            Counts {
                total: 2,
                skipped: 1,
                passed: 0,
                failed: 1,
            }
        );
        assert_eq!(
            out,
            fixtures.error_line("bad.json", "fixture has neither `data` nor `hexdata`")
        );
    }

    #[test]
    fn only_leading_array_elements_are_checked() {
        let fixtures = Fixtures::new().add(
            "items.json",
            json!({"data": "AQI=", "expected": {"items": [1, 2]}}),
        );
        let mut stub = StubDriver::default().answer("AQI=", json!({"items": [1, 2, 3, 4]}));

        let (counts, _) = run(&mut stub, &fixtures, false);

        assert!(counts.all_passed());
    }

    #[test]
    fn unparsable_output_is_a_test_failure() {
        let fixtures = Fixtures::new().add("junk.json", json!({"data": "AA==", "expected": {}}));
        let mut stub = StubDriver::default().garble("AA==", "segfault");

        let (counts, out) = run(&mut stub, &fixtures, false);

        assert_eq!(counts.failed, 1);
        assert!(out.contains("decoder output is not valid JSON"), "{out}");
    }

    #[test]
    fn stops_at_first_failure() {
        let fixtures = Fixtures::new()
            .add("1.json", json!({"data": "one", "expected": {"v": 1}}))
            .add("2.json", json!({"data": "two", "expected": {"v": 2}}))
            .add("3.json", json!({"data": "three", "expected": {"v": 3}}));
        let mut stub = StubDriver::default()
            .answer("one", json!({"v": 1}))
            .answer("two", json!({"v": 0}))
            .answer("three", json!({"v": 3}));

        let (counts, out) = run(&mut stub, &fixtures, false);

        assert_eq!(
            stub.calls.iter().map(|p| p.data.as_str()).collect::<Vec<_>>(),
            vec!["one", "two"]
        );
        assert_eq!(
            counts,
            Counts {
                total: 3,
                skipped: 1,
                passed: 1,
                failed: 1,
            }
        );
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn keep_going_reports_every_failure() {
        let fixtures = Fixtures::new()
            .add("1.json", json!({"data": "one", "expected": {"v": 1}}))
            .add("2.json", json!({"data": "two", "expected": {"v": 2}}))
            .add("3.json", json!({"data": "three", "expected": {"v": 3}}));
        let mut stub = StubDriver::default()
            .answer("one", json!({"v": 0}))
            .answer("two", json!({"v": 2}))
            .garble("three", "");

        let (counts, out) = run(&mut stub, &fixtures, true);

        assert_eq!(stub.calls.len(), 3);
        assert_eq!(
            counts,
            Counts {
                total: 3,
                skipped: 0,
                passed: 1,
                failed: 2,
            }
        );
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("1.json: mismatch at v: expected 1, found 0"));
        assert!(lines[1].contains("3.json: decoder output is not valid JSON"));
    }

    #[test]
    fn unreachable_decoder_stops_even_when_keeping_going() {
        let fixtures = Fixtures::new()
            .add("1.json", json!({"data": "one", "expected": {"v": 1}}))
            .add("2.json", json!({"data": "two", "expected": {"v": 2}}))
            .add("3.json", json!({"data": "three", "expected": {"v": 3}}));
        let mut stub = StubDriver::default()
            .unreachable("one")
            .answer("two", json!({"v": 2}))
            .answer("three", json!({"v": 3}));

        let (counts, out) = run(&mut stub, &fixtures, true);

        assert_eq!(
            stub.calls.iter().map(|p| p.data.as_str()).collect::<Vec<_>>(),
            vec!["one"]
        );
        assert_eq!(
            counts,
            Counts {
                total: 3,
                skipped: 2,
                passed: 0,
                failed: 1,
            }
        );
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("Error: "), "{out}");
        assert!(out.contains("cannot run decoder `stub`"), "{out}");
    }

    #[test]
    fn no_fixtures_is_a_pass() {
        let fixtures = Fixtures::new();
        let mut stub = StubDriver::default();

        let (counts, out) = run(&mut stub, &fixtures, false);

        assert!(counts.all_passed());
        assert_eq!(counts.total, 0);
        assert_eq!(out, "");
    }

    #[test]
    fn verbose_prints_a_summary() {
        let fixtures = Fixtures::new()
            .add("ack.json", ack_fixture())
            .add("bad.json", json!({"expected": {}}));
        let mut stub = StubDriver::default().answer("01020304", json!({"type": "ack", "seq": 3}));
        let mut out = Vec::new();

        let counts = Harness::new(&mut stub, &mut out)
            .verbose(true)
            .run(&fixtures.paths)
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(counts.passed, 1);
        assert!(out.contains("PASS"), "{out}");
        assert!(out.contains("FAIL"), "{out}");
        assert!(out.trim_end().ends_with("2 total"), "{out}");
    }
}
