//! Error reporting for AWS calls

/// Maximum length of an error message to log (to avoid logging sensitive data)
const MAX_LOG_MESSAGE_LENGTH: usize = 200;

/// Sanitize a service error message for logging
/// Truncates long messages and strips non-printable characters
pub(crate) fn sanitize_for_log(message: &str) -> String {
    let truncated = if message.len() > MAX_LOG_MESSAGE_LENGTH {
        let cut = (0..=MAX_LOG_MESSAGE_LENGTH)
            .rev()
            .find(|i| message.is_char_boundary(*i))
            .unwrap_or(0);
        format!(
            "{}... [truncated, {} bytes total]",
            &message[..cut],
            message.len()
        )
    } else {
        message.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Format an AWS API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_aws_error(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);

    if error_str.contains("403") || error_str.contains("AccessDenied") {
        return "Permission denied. Check the IAM policy of your credentials.".to_string();
    }
    if error_str.contains("InvalidClientTokenId")
        || error_str.contains("ExpiredToken")
        || error_str.contains("SignatureDoesNotMatch")
    {
        return "Authentication failed. Check your AWS credentials.".to_string();
    }
    if error_str.contains("429") || error_str.contains("Throttling") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if error_str.contains("400") {
        return "Invalid request. Check your parameters.".to_string();
    }
    if error_str.contains("500") || error_str.contains("503") {
        return "AWS service temporarily unavailable. Please try again.".to_string();
    }
    if error_str.contains("no credentials") || error_str.contains("credentials provider") {
        return "No AWS credentials found. Configure a profile or set AWS_ACCESS_KEY_ID."
            .to_string();
    }
    if error_str.contains("dispatch failure") {
        return "Request failed. Check your network connection and try again.".to_string();
    }

    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
