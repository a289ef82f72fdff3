use std::path::Path;

use mutator::parser::Frontend;

#[test]
fn python_files_have_a_frontend() {
    let frontend = mutator::frontend_for(Path::new("foo.py")).unwrap();
    assert_eq!(frontend.extensions(), ["py"]);
    assert!(mutator::frontend_for(Path::new("pkg/sub/module.py")).is_some());
}

#[test]
fn unknown_extensions_have_none() {
    assert!(mutator::frontend_for(Path::new("foo.rs")).is_none());
    assert!(mutator::frontend_for(Path::new("foo.js")).is_none());
    assert!(mutator::frontend_for(Path::new("foo.pyc")).is_none());
    assert!(mutator::frontend_for(Path::new("foo")).is_none());
}
