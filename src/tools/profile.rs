//! Reading and editing the user profile

use super::ToolContext;
use super::validate::{validate_numeric_param, validate_string_param};
use crate::agent::UserData;
use crate::agent::extract::title_case;
use crate::{Error, Result};

const FIELDS: &[&str] = &["name", "age", "country", "interests"];
const MAX_STORED_INTERESTS: usize = 10;

/// Summary of what is known about the user
pub async fn get_user_summary(ctx: &ToolContext) -> String {
    let summary = ctx.userdata.lock().await.summary();
    tracing::info!(summary = %summary, "user summary requested");
    summary
}

/// Set one profile field from a free-form value
///
/// # Errors
///
/// Returns [`Error::Tool`] for an unknown field or an invalid value
pub async fn update_user_profile(ctx: &ToolContext, field: &str, value: &str) -> Result<String> {
    let field = validate_string_param(&field.to_lowercase(), "field", 1, 20, Some(FIELDS))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Tool("falta el valor a actualizar".to_string()));
    }

    let mut user = ctx.userdata.lock().await;
    let reply = match field.as_str() {
        "name" => update_name(&mut user, value)?,
        "age" => update_age(&mut user, value)?,
        "country" => update_country(&mut user, value)?,
        _ => update_interests(&mut user, value)?,
    };
    tracing::info!(field = %field, "user profile updated");
    Ok(reply)
}

/// Forget name, age, country and interests; persona and mode stay
pub async fn clear_user_data(ctx: &ToolContext) -> String {
    let mut user = ctx.userdata.lock().await;
    let previous = user.name.take();
    user.clear_profile();
    tracing::info!(user = previous.as_deref().unwrap_or("anonymous"), "user data cleared");

    format!(
        "He borrado tu información personal. Sigo en modo {} con interacción {}.",
        user.current_persona, user.io_mode
    )
}

fn update_name(user: &mut UserData, value: &str) -> Result<String> {
    let name = title_case(&validate_string_param(value, "name", 1, 50, None)?);
    let reply = format!("He actualizado tu nombre a {name}. ¡Encantada de conocerte!");
    user.name = Some(name);
    Ok(reply)
}

fn update_age(user: &mut UserData, value: &str) -> Result<String> {
    let age: u32 = value
        .parse()
        .map_err(|_| Error::Tool("la edad debe ser un número".to_string()))?;
    let age = validate_numeric_param(age, "age", Some(5), Some(120))?;
    user.age = Some(age);
    Ok(format!("He actualizado tu edad a {age} años."))
}

fn update_country(user: &mut UserData, value: &str) -> Result<String> {
    let country = title_case(&validate_string_param(value, "country", 2, 100, None)?);
    let reply = format!("He actualizado tu país a {country}.");
    user.country = Some(country);
    Ok(reply)
}

fn update_interests(user: &mut UserData, value: &str) -> Result<String> {
    let mut added = Vec::new();
    for interest in value.split(',').map(|i| i.trim().to_lowercase()) {
        if !interest.is_empty() && !user.interests.contains(&interest) && !added.contains(&interest) {
            added.push(interest);
        }
    }
    if value.split(',').all(|i| i.trim().is_empty()) {
        return Err(Error::Tool("indica al menos un interés".to_string()));
    }

    user.interests.extend(added.iter().cloned());
    user.interests.truncate(MAX_STORED_INTERESTS);

    if added.is_empty() {
        Ok("Esos intereses ya estaban en tu perfil.".to_string())
    } else {
        Ok(format!("He añadido a tu perfil: {}.", added.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, persona_dir};

    #[tokio::test]
    async fn summary_of_new_user() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());
        assert_eq!(
            get_user_summary(&ctx).await,
            "Usuario nuevo sin información recopilada"
        );
    }

    #[tokio::test]
    async fn updates_each_field() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());

        update_user_profile(&ctx, "name", "maría josé").await.unwrap();
        update_user_profile(&ctx, "AGE", " 34 ").await.unwrap();
        update_user_profile(&ctx, "country", "costa rica").await.unwrap();
        update_user_profile(&ctx, "interests", "Cine, viajar, cine").await.unwrap();

        let user = ctx.userdata.lock().await;
        assert_eq!(user.name.as_deref(), Some("María José"));
        assert_eq!(user.age, Some(34));
        assert_eq!(user.country.as_deref(), Some("Costa Rica"));
        assert_eq!(user.interests, vec!["cine", "viajar"]);
    }

    #[tokio::test]
    async fn rejects_bad_values() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());

        assert!(update_user_profile(&ctx, "age", "treinta").await.is_err());
        assert!(update_user_profile(&ctx, "age", "200").await.is_err());
        assert!(update_user_profile(&ctx, "country", "x").await.is_err());
        assert!(update_user_profile(&ctx, "email", "a@b.c").await.is_err());
        assert!(update_user_profile(&ctx, "interests", " , ").await.is_err());
        assert!(update_user_profile(&ctx, "name", "   ").await.is_err());
        assert_eq!(*ctx.userdata.lock().await, UserData::new("rosalia", Default::default()));
    }

    #[tokio::test]
    async fn interests_are_capped_and_deduplicated() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());

        let many = (0..12).map(|i| format!("i{i}")).collect::<Vec<_>>().join(",");
        update_user_profile(&ctx, "interests", &many).await.unwrap();
        assert_eq!(ctx.userdata.lock().await.interests.len(), MAX_STORED_INTERESTS);

        let reply = update_user_profile(&ctx, "interests", "i0").await.unwrap();
        assert_eq!(reply, "Esos intereses ya estaban en tu perfil.");
    }

    #[tokio::test]
    async fn clearing_keeps_persona_and_mode() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());
        update_user_profile(&ctx, "name", "ana").await.unwrap();

        let reply = clear_user_data(&ctx).await;

        assert!(reply.contains("rosalia"));
        let user = ctx.userdata.lock().await;
        assert!(user.name.is_none());
        assert_eq!(user.current_persona, "rosalia");
    }
}
