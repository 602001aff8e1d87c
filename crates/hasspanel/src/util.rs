/// Compare two optional lists element by element.
///
/// The same slice is always equal to itself. An absent list is unequal to
/// everything, including another absent list, so a list that was never
/// fetched always reads as "changed". This departs from the GNOME extension's
/// helper, where two `null` lists compare equal through `null === null` and
/// only `null` against `undefined` is unequal; `Option` has a single absent
/// value, and treating it as "changed" makes the first refresh always report.
/// Otherwise lengths and then the elements at matching indices are compared;
/// order matters and nothing is deduplicated.
pub fn equals<T: PartialEq>(a: Option<&[T]>, b: Option<&[T]>) -> bool {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };

    if std::ptr::eq(a, b) {
        return true;
    }

    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).all(|(x, y)| x == y)
}
