//! HTTP handlers.

pub mod confirm;
pub mod diagnostics;
pub mod health;
pub mod location;
pub mod login;
pub mod logout;
pub mod me;
pub mod password;
pub mod profile;
pub mod register;
pub mod resend;

pub use confirm::{CONFIRM_LINK_PATH, CONFIRM_PATH, ConfirmRequest, ConfirmResponse, confirm_routes};
pub use diagnostics::{
    DIAGNOSTICS_EMAIL_PATH, DIAGNOSTICS_ENV_PATH, DIAGNOSTICS_PATH, diagnostics_routes,
};
pub use health::{HEALTH_PATH, health_routes};
pub use location::{LOCATION_PREFERENCES_PATH, LocationPreferencesRequest, location_routes};
pub use login::{LOGIN_PATH, LoginRequest, SessionResponse, login_routes};
pub use logout::{LOGOUT_PATH, LogoutResponse, logout_routes};
pub use me::{ME_PATH, me_routes};
pub use password::{
    PASSWORD_FORGOT_MESSAGE, PASSWORD_FORGOT_PATH, PASSWORD_PATH, PASSWORD_RESET_PATH,
    PasswordResponse, password_routes,
};
pub use profile::{PROFILE_PATH, ProfileRequest, profile_routes};
pub use register::{REGISTER_PATH, RegisterRequest, RegisterResponse, register_routes};
pub use resend::{RESEND_MESSAGE, RESEND_PATH, ResendResponse, resend_routes};
