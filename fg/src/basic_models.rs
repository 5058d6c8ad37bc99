use serde::{Deserialize, Serialize};

/// A recipe as submitted by a client, for both creation and full update.
#[derive(Deserialize, Serialize, Clone, Default)]
pub struct RecipeDraft {
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub ingredients: Vec<IngredientAmount>,
    #[serde(default)]
    pub name: String,
    /// A base64 data URL. Required on creation, optional on update.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub cooking_time: i64,
}

impl std::fmt::Debug for RecipeDraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeDraft")
            .field("tags", &self.tags)
            .field("ingredients", &self.ingredients)
            .field("name", &self.name)
            .field("image", &self.image.as_ref().map(|i| i.len()))
            .field("cooking_time", &self.cooking_time)
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct UserRegistration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl std::fmt::Debug for UserRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegistration")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Serialize, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct PasswordChange {
    pub new_password: String,
    pub current_password: String,
}

/// One entry of the ingredient seed file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IngredientSeed {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TagDraft {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct IngredientDraft {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}
