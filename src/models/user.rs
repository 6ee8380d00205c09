// Contact details of the account placing a booking
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserContact {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
}
