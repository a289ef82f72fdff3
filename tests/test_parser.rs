use camino::Utf8Path;
use mutator::Error;
use mutator::parser::{Frontend, PythonFrontend};

fn round_trip(source: &str) {
    let tree = PythonFrontend.parse(Utf8Path::new("t.py"), source).unwrap();
    assert_eq!(tree.code(), source);
}

#[test]
fn regenerates_a_module_exactly() {
    round_trip(
        r#"
"""Module docstring."""
import os
from typing import Optional

__version__ = "1.0"


class Greeter(object):
    prefix: str = 'hi'

    @property
    def name(self) -> Optional[str]:
        # trailing spaces and tabs	
        return self._name  # pragma: no mutate

    async def wait(self, *args, **kwargs):
        await something(*args, **kwargs)


def compute(values, scale=2.5e-3):
    total = sum(v ** 2 for v in values if v is not None)
    lookup = {k: v for k, v in zip("abc", range(3))}
    return lambda x: (total * scale) // x if x else lookup[x]
"#,
    );
}

#[test]
fn regenerates_odd_whitespace() {
    round_trip("x = 1\r\ny = 2\r\n");
    round_trip("x = [\n    1,\n    2,\n]\n\n\n");
    round_trip("s = f'{a!r:>10}' 'tail'\n");
    round_trip("if a:\n    pass\n# comment at the end");
    round_trip("");
    round_trip("\n\n");
}

#[test]
fn regenerates_non_ascii_text() {
    round_trip("name = 'héllo wörld'  # ünïcode\n");
}

#[test]
fn reports_first_broken_line() {
    let err = PythonFrontend
        .parse(Utf8Path::new("pkg/bad.py"), "a = 1\nb = 2\nc = = 3\n")
        .unwrap_err();
    match err {
        Error::Syntax { filename, line, text } => {
            assert_eq!(filename, "pkg/bad.py");
            assert_eq!(line, 3);
            assert_eq!(text, "c = = 3");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn syntax_error_message_names_the_file() {
    let err = PythonFrontend
        .parse(Utf8Path::new("broken.py"), "def f(:\n    pass\n")
        .unwrap_err();
    assert!(err.to_string().contains("broken.py"), "{err}");
}
