use serde::{Deserialize, Serialize};
use sqlx::postgres;
use sqlx::{Decode, Encode, Type};

/// `TextJson` is a newtype wrapper like `sqlx::types::Json`, but encodes
/// itself using the postgres `JSON` protocol encoding (the unmodified
/// textual encoding) rather than `JSONB`. This preserves property order on
/// the opaque blobs the engine only round-trips (`raw.raw_data`,
/// `staging.data`) rather than queries into.
#[derive(Clone, Debug, Serialize)]
pub struct TextJson<T>(pub T);

impl<T> std::ops::Deref for TextJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> Type<postgres::Postgres> for TextJson<T> {
    fn type_info() -> postgres::PgTypeInfo {
        postgres::PgTypeInfo::with_name("JSON")
    }
    fn compatible(ty: &postgres::PgTypeInfo) -> bool {
        *ty == Self::type_info()
    }
}

impl<T> sqlx::postgres::PgHasArrayType for TextJson<T> {
    fn array_type_info() -> postgres::PgTypeInfo {
        postgres::PgTypeInfo::with_name("_JSON")
    }
}

impl<T: Serialize> Encode<'_, postgres::Postgres> for TextJson<T> {
    fn encode_by_ref(&self, buf: &mut postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        buf.push(b' '); // Send as JSON (not JSONB).
        serde_json::to_writer(&mut **buf, &self.0)
            .expect("failed to serialize TextJson for transmission to database");
        sqlx::encode::IsNull::No
    }
}

impl<'r, T: 'r> Decode<'r, postgres::Postgres> for TextJson<T>
where
    T: Deserialize<'r>,
{
    fn decode(value: postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <sqlx::types::Json<T> as Decode<'r, postgres::Postgres>>::decode(value).map(|t| Self(t.0))
    }
}
