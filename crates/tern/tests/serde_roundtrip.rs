//! Lattice values survive serialization, so language-server callers can
//! cache or ship them between processes.

use pretty_assertions::assert_eq;
use tern::{Atom, Fields, Ty};

fn roundtrip(ty: &Ty) -> Ty {
    let encoded = serde_json::to_string(ty).expect("lattice values serialize");
    serde_json::from_str(&encoded).expect("lattice values deserialize")
}

#[test]
fn expanded_shapes_roundtrip() {
    let mut fields = Fields::new();
    fields.insert(Atom::from("__struct__"), Ty::atom("User"));
    fields.insert(Atom::from("name"), Ty::Unknown);
    let subjects = [
        Ty::atom("ok"),
        Ty::Integer(-3),
        Ty::Unknown,
        Ty::None,
        Ty::Tuple(vec![Ty::atom("ok"), Ty::Integer(1)]),
        Ty::Union(vec![Ty::atom("up"), Ty::atom("down")]),
        Ty::Struct(fields.clone(), Some(Box::new(Ty::atom("User"))), None),
        Ty::Map(fields, None),
    ];
    for subject in &subjects {
        assert_eq!(&roundtrip(subject), subject);
    }
}

#[test]
fn binding_expressions_roundtrip() {
    let call = Ty::Call(
        Box::new(Ty::Variable(Atom::from("mod"))),
        Atom::from("get"),
        vec![Ty::Attribute(Atom::from("conf")), Ty::atom("key")],
    );
    assert_eq!(roundtrip(&call), call);
    let projection = Ty::TupleNth(Box::new(Ty::LocalCall(Atom::from("now"), vec![])), 1);
    assert_eq!(roundtrip(&projection), projection);
}

/// Field order is preserved through serialization.
#[test]
fn field_order_survives() {
    let mut fields = Fields::new();
    fields.insert(Atom::from("z"), Ty::Integer(1));
    fields.insert(Atom::from("a"), Ty::Integer(2));
    let Ty::Map(decoded, None) = roundtrip(&Ty::Map(fields, None)) else {
        panic!("expected a map");
    };
    let keys: Vec<_> = decoded.keys().map(Atom::as_str).collect();
    assert_eq!(keys, vec!["z", "a"]);
}
