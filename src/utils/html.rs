// src/utils/html.rs

/// Sanitizes free text written by students (review comments) before it is
/// stored and later rendered in the admin review queue.
///
/// Safe inline tags such as `<b>` survive; `<script>` is removed together
/// with its content, as are event-handler attributes.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
