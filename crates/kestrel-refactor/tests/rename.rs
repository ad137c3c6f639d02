use std::sync::Arc;

use kestrel_refactor::{
    apply_plan, rename, CancellationToken, DocumentId, FileId, FileRenameOp, InvariantViolation,
    Occurrence, Outcome, PlanOperation, Position, Range, RefactorContext, RefactorError,
    RenameOptions, RenameParams, Snapshot, StaticAnalysis, SymbolKind, TextEdit,
    UnavailableReason, WorkspaceEditPlan,
};
use kestrel_test_utils::Fixture;
use pretty_assertions::assert_eq;

struct Setup {
    fixture: Fixture,
    snapshot: Snapshot,
    analysis: StaticAnalysis,
}

impl Setup {
    fn new(text: &str) -> Self {
        let fixture = Fixture::parse(text);
        let snapshot = Snapshot::new(
            fixture
                .files()
                .map(|(file, text)| (file.clone(), text.to_string())),
        );
        Self {
            fixture,
            snapshot,
            analysis: StaticAnalysis::new(),
        }
    }

    fn symbol(mut self, name: &str, kind: SymbolKind) -> Self {
        self.analysis.add_named_symbol(&self.snapshot, name, kind);
        self
    }

    fn context(&self) -> RefactorContext {
        RefactorContext::new(self.snapshot.clone(), Arc::new(self.analysis.clone()))
    }

    fn params(&self, marker: u32, new_name: &str) -> RenameParams {
        RenameParams {
            document: DocumentId::unversioned(self.fixture.marker_file(marker)),
            position: self.fixture.marker_position(marker),
            new_name: new_name.to_string(),
        }
    }

    fn rename(&self, marker: u32, new_name: &str) -> WorkspaceEditPlan {
        match rename(&self.context(), self.params(marker, new_name)).unwrap() {
            Outcome::Planned(plan) => plan,
            Outcome::Unavailable(reason) => panic!("rename unavailable: {reason}"),
        }
    }

    fn applied(&self, plan: &WorkspaceEditPlan) -> Vec<(String, String)> {
        apply_plan(&self.snapshot.texts(), plan)
            .unwrap()
            .into_iter()
            .map(|(file, text)| (file.as_str().to_string(), text))
            .collect()
    }
}

fn files(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(file, text)| (file.to_string(), text.to_string()))
        .collect()
}

#[test]
fn function_rename_inserts_only_the_new_characters_in_every_file() {
    let setup = Setup::new(
        r#"
//- /ws/lib.py
def $0myfunc1():
    pass
//- /ws/main.py
from lib import myfunc1
myfunc1()
"#,
    )
    .symbol("myfunc1", SymbolKind::Function);

    let plan = setup.rename(0, "my_function_1");
    let lib = FileId::new("file:///ws/lib.py");
    let main = FileId::new("file:///ws/main.py");

    assert_eq!(
        plan.edits_for(&lib).unwrap(),
        &[
            TextEdit::insert(Position::new(0, 6), "_"),
            TextEdit::insert(Position::new(0, 10), "tion_"),
        ]
    );
    assert_eq!(
        plan.edits_for(&main).unwrap(),
        &[
            TextEdit::insert(Position::new(0, 18), "_"),
            TextEdit::insert(Position::new(0, 22), "tion_"),
            TextEdit::insert(Position::new(1, 2), "_"),
            TextEdit::insert(Position::new(1, 6), "tion_"),
        ]
    );
    assert_eq!(plan.renames().count(), 0);

    assert_eq!(
        setup.applied(&plan),
        files(&[
            ("file:///ws/lib.py", "def my_function_1():\n    pass\n"),
            (
                "file:///ws/main.py",
                "from lib import my_function_1\nmy_function_1()\n"
            ),
        ])
    );
}

#[test]
fn edits_at_column_zero() {
    let setup = Setup::new(
        r#"
//- /ws/main.py
$0old_name = 1
print(old_name)
"#,
    )
    .symbol("old_name", SymbolKind::Variable);

    let plan = setup.rename(0, "new_name");
    assert_eq!(
        plan.edits_for(&FileId::new("file:///ws/main.py")).unwrap(),
        &[
            TextEdit::replace(Range::on_line(0, 0, 3), "new"),
            TextEdit::replace(Range::on_line(1, 6, 9), "new"),
        ]
    );

    let setup = Setup::new(
        r#"
//- /ws/main.py
$0value = 1
print(value)
"#,
    )
    .symbol("value", SymbolKind::Variable);

    let plan = setup.rename(0, "_value");
    assert_eq!(
        plan.edits_for(&FileId::new("file:///ws/main.py")).unwrap(),
        &[
            TextEdit::insert(Position::new(0, 0), "_"),
            TextEdit::insert(Position::new(1, 6), "_"),
        ]
    );
}

#[test]
fn last_line_without_trailing_newline() {
    let file = FileId::new("file:///ws/main.py");
    let snapshot = Snapshot::new([(file.clone(), "count = 0\nprint(count)".to_string())]);
    let mut analysis = StaticAnalysis::new();
    analysis.add_named_symbol(&snapshot, "count", SymbolKind::Variable);
    let ctx = RefactorContext::new(snapshot.clone(), Arc::new(analysis));

    let plan = rename(
        &ctx,
        RenameParams {
            document: DocumentId::unversioned(file.clone()),
            position: Position::new(1, 11),
            new_name: "total".to_string(),
        },
    )
    .unwrap()
    .planned()
    .unwrap();

    let applied = apply_plan(&snapshot.texts(), &plan).unwrap();
    assert_eq!(applied[&file], "total = 0\nprint(total)");
}

#[test]
fn module_rename_edits_imports_then_moves_the_file() {
    let setup = Setup::new(
        r#"
//- /ws/main.py
import $0util
util.run()
//- /ws/util.py
def run():
    pass
"#,
    );
    let module = setup.fixture.file("/ws/util.py");
    let setup = setup.symbol("util", SymbolKind::Module { file: module.clone() });

    let plan = setup.rename(0, "helpers");
    assert!(matches!(plan.operations.first(), Some(PlanOperation::Edit(_))));
    assert_eq!(
        plan.operations.last(),
        Some(&PlanOperation::Rename(FileRenameOp {
            old: module,
            new: FileId::new("file:///ws/helpers.py"),
            options: RenameOptions::default(),
        }))
    );
    assert_eq!(plan.renames().count(), 1);

    assert_eq!(
        setup.applied(&plan),
        files(&[
            ("file:///ws/helpers.py", "def run():\n    pass\n"),
            ("file:///ws/main.py", "import helpers\nhelpers.run()\n"),
        ])
    );
}

#[test]
fn package_rename_moves_the_directory() {
    let setup = Setup::new(
        r#"
//- /ws/main.py
from $0pkg import mod
import pkg.mod
//- /ws/pkg/__init__.py
//- /ws/pkg/mod.py
X = 1
"#,
    )
    .symbol(
        "pkg",
        SymbolKind::Package {
            dir: FileId::new("file:///ws/pkg"),
        },
    );

    let plan = setup.rename(0, "lib");
    assert_eq!(
        plan.renames().collect::<Vec<_>>(),
        vec![&FileRenameOp {
            old: FileId::new("file:///ws/pkg"),
            new: FileId::new("file:///ws/lib"),
            options: RenameOptions::default(),
        }]
    );
    assert_eq!(
        setup.applied(&plan),
        files(&[
            ("file:///ws/lib/__init__.py", ""),
            ("file:///ws/lib/mod.py", "X = 1\n"),
            ("file:///ws/main.py", "from lib import mod\nimport lib.mod\n"),
        ])
    );
}

#[test]
fn init_module_rename_moves_its_package() {
    let setup = Setup::new(
        r#"
//- /ws/main.py
import $0pkg
//- /ws/pkg/__init__.py
VERSION = 1
"#,
    )
    .symbol(
        "pkg",
        SymbolKind::Module {
            file: FileId::new("file:///ws/pkg/__init__.py"),
        },
    );

    let plan = setup.rename(0, "core");
    assert_eq!(
        plan.renames().map(|op| op.new.clone()).collect::<Vec<_>>(),
        vec![FileId::new("file:///ws/core")]
    );
    assert_eq!(
        setup.applied(&plan),
        files(&[
            ("file:///ws/core/__init__.py", "VERSION = 1\n"),
            ("file:///ws/main.py", "import core\n"),
        ])
    );
}

#[test]
fn import_bindings_reported_as_definitions_are_still_edited() {
    let main = FileId::new("file:///ws/main.py");
    let module = FileId::new("file:///ws/somepackage/somemodule.py");
    let snapshot = Snapshot::new([
        (
            main.clone(),
            "from somepackage import somemodule\n\n\nsomemodule.foo()\n".to_string(),
        ),
        (module.clone(), "def foo():\n    pass\n".to_string()),
    ]);
    let document = DocumentId::unversioned(main.clone());
    let analysis = StaticAnalysis::new().with_symbol(
        "somemodule",
        SymbolKind::Module {
            file: module.clone(),
        },
        vec![
            Occurrence::definition(document.clone(), Range::on_line(0, 24, 34)),
            Occurrence::reference(document.clone(), Range::on_line(3, 0, 10)),
        ],
    );
    let ctx = RefactorContext::new(snapshot.clone(), Arc::new(analysis));

    let plan = rename(
        &ctx,
        RenameParams {
            document,
            position: Position::new(3, 2),
            new_name: "new_somemodule".to_string(),
        },
    )
    .unwrap()
    .planned()
    .unwrap();

    assert_eq!(
        plan.renames().map(|op| op.old.clone()).collect::<Vec<_>>(),
        vec![module]
    );
    let applied: Vec<(String, String)> = apply_plan(&snapshot.texts(), &plan)
        .unwrap()
        .into_iter()
        .map(|(file, text)| (file.as_str().to_string(), text))
        .collect();
    assert_eq!(
        applied,
        files(&[
            (
                "file:///ws/main.py",
                "from somepackage import new_somemodule\n\n\nnew_somemodule.foo()\n"
            ),
            (
                "file:///ws/somepackage/new_somemodule.py",
                "def foo():\n    pass\n"
            ),
        ])
    );
}

#[test]
fn occurrences_covering_more_than_the_name_fail() {
    let file = FileId::new("file:///ws/main.py");
    let snapshot = Snapshot::new([(file.clone(), "x = 1\nprint(x)\n".to_string())]);
    let document = DocumentId::unversioned(file.clone());
    let analysis = StaticAnalysis::new().with_symbol(
        "x",
        SymbolKind::Variable,
        vec![
            Occurrence::definition(document.clone(), Range::on_line(0, 0, 50)),
            Occurrence::reference(document.clone(), Range::on_line(1, 6, 7)),
        ],
    );
    let ctx = RefactorContext::new(snapshot, Arc::new(analysis));

    let result = rename(
        &ctx,
        RenameParams {
            document,
            position: Position::new(1, 6),
            new_name: "y".to_string(),
        },
    );
    assert_eq!(
        result,
        Err(RefactorError::InvariantViolation(
            InvariantViolation::OccurrenceOutOfBounds {
                file,
                range: Range::on_line(0, 0, 5),
            }
        ))
    );
}

#[test]
fn renaming_to_the_same_name_is_an_empty_plan() {
    let setup = Setup::new(
        r#"
//- /ws/main.py
$0count = 1
"#,
    )
    .symbol("count", SymbolKind::Variable);

    assert_eq!(setup.rename(0, "count"), WorkspaceEditPlan::default());
}

#[test]
fn rejected_requests() {
    let setup = Setup::new(
        r#"
//- /ws/main.py
$0count = 1
$1print(count)
"#,
    )
    .symbol("count", SymbolKind::Variable);
    let ctx = setup.context();

    for bad in ["class", "1st", "with space", ""] {
        assert!(
            matches!(
                rename(&ctx, setup.params(0, bad)),
                Err(RefactorError::InvalidIdentifier { .. })
            ),
            "{bad:?} should be rejected"
        );
    }

    assert_eq!(
        rename(&ctx, setup.params(1, "total")).unwrap(),
        Outcome::Unavailable(UnavailableReason::UnresolvedSymbol)
    );

    let mut stale = setup.params(0, "total");
    stale.document = DocumentId::versioned(stale.document.file.clone(), 7);
    assert!(matches!(
        rename(&ctx, stale),
        Err(RefactorError::VersionMismatch {
            expected: Some(7),
            actual: None,
            ..
        })
    ));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let cancelled = setup.context().with_cancellation(cancel);
    assert_eq!(
        rename(&cancelled, setup.params(0, "total")),
        Err(RefactorError::Cancelled)
    );
}
