//! Account and session endpoints: register, verify, login, profile,
//! change-password.

/// `POST /login` request body.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// The server accepts either the username or the email address here.
    pub username_or_email: String,
    pub password: String,
}

/// `POST /register` request body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// `POST /register` success body.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
    /// Only present when the server is configured to echo the code back
    /// (development deployments).
    #[serde(default)]
    pub verification_code: Option<String>,
}

/// `POST /verify` request body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationRequest {
    pub email: String,
    pub code: String,
}

/// `POST /verify` success body.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct VerificationResponse {
    pub message: String,
}

/// `POST /login` success body.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Account record as the server reports it (`/login` payload and
/// `GET /user/profile`).
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_verified: bool,
}

/// `POST /change-password` request body.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `POST /change-password` success body.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ChangePasswordResponse {
    pub message: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_uses_camel_case_on_the_wire() {
        let body = serde_json::to_value(LoginRequest {
            username_or_email: "mira".into(),
            password: "secret".into(),
        })
        .unwrap();
        assert_eq!(body["usernameOrEmail"], "mira");
        assert_eq!(body["password"], "secret");
    }

    #[test]
    fn change_password_request_uses_camel_case_on_the_wire() {
        let body = serde_json::to_value(ChangePasswordRequest {
            current_password: "old".into(),
            new_password: "new".into(),
        })
        .unwrap();
        assert_eq!(body["currentPassword"], "old");
        assert_eq!(body["newPassword"], "new");
    }

    #[test]
    fn auth_response_parses_is_verified_from_camel_case() {
        let parsed: AuthResponse = serde_json::from_str(
            r#"{"token":"t1","user":{"id":"u1","username":"mira","email":"m@e.com","isVerified":true}}"#,
        )
        .unwrap();
        assert_eq!(parsed.token, "t1");
        assert!(parsed.user.is_verified);
    }
}
