//! Document numbers backed by Postgres sequences.

use chrono::NaiveDate;
use coopbank_core::numbering::{DocumentKind, document_number};
use sea_orm::{ConnectionTrait, DbBackend, DbErr, FromQueryResult, Statement};

#[derive(Debug, FromQueryResult)]
struct NextValue {
    value: i64,
}

/// Draws the next value of the kind's sequence and formats it for `date`.
///
/// Sequence values are never rolled back, so numbers may have gaps.
pub(crate) async fn next_number<C: ConnectionTrait>(
    conn: &C,
    kind: DocumentKind,
    date: NaiveDate,
) -> Result<String, DbErr> {
    let stmt = Statement::from_string(
        DbBackend::Postgres,
        format!("SELECT nextval('{}') AS value", kind.sequence_name()),
    );
    let next = NextValue::find_by_statement(stmt)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(kind.sequence_name().to_string()))?;

    Ok(document_number(kind, date, next.value))
}
