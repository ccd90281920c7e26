use maud::{html, DOCTYPE};

use super::domain::Contact;
use super::token::IssuedToken;
use crate::mail::OutboundEmail;

pub const VERIFICATION_SUBJECT: &str = "Verify Your Email Address";

/// Link embedded in the confirmation email. `base_url` has no trailing slash.
pub fn confirmation_link(base_url: &str, token: &IssuedToken) -> String {
    format!(
        "{}/verify?token={}",
        base_url.trim_end_matches('/'),
        token.expose()
    )
}

pub fn verification_email(contact: &Contact, link: &str) -> OutboundEmail {
    let greeting = match &contact.name {
        Some(name) => format!("Hello {name},"),
        None => "Hello!".to_string(),
    };

    let text_body = format!(
        "{greeting}\n\n\
         Thank you for sharing your email address with us!\n\n\
         To complete your email verification, please open the link below:\n\n\
         {link}\n\n\
         If you didn't request this verification, you can safely ignore this email.\n\n\
         Best regards,\n\
         The County Desk Team"
    );

    let html_body = html! {
        (DOCTYPE)
        html {
            head { meta charset="utf-8"; }
            body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;" {
                h2 style="color: #2563eb;" { (VERIFICATION_SUBJECT) }
                p { (greeting) }
                p { "Thank you for sharing your email address with us!" }
                p style="text-align: center; margin: 30px 0;" {
                    a href=(link) style="background-color: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; display: inline-block; font-weight: bold;" {
                        "Verify My Email"
                    }
                }
                p style="color: #666; font-size: 14px;" {
                    "Or copy and paste this link into your browser:"
                    br;
                    a href=(link) style="color: #2563eb; word-break: break-all;" { (link) }
                }
                p style="color: #999; font-size: 12px; margin-top: 40px; border-top: 1px solid #eee; padding-top: 20px;" {
                    "If you didn't request this verification, you can safely ignore this email."
                }
            }
        }
    }
    .into_string();

    OutboundEmail {
        to: contact.email.to_string(),
        subject: VERIFICATION_SUBJECT.to_string(),
        text_body,
        html_body: Some(html_body),
    }
}
