//! User-visible message strings, in one place.

pub const GREETING: &str = "👋 Hi! I'm Boompi, your AI assistant.\n\n\
Send me a question as text or a voice note, attach a document (PDF, DOCX, TXT) \
or a photo, and I'll answer right here. Use /help for details.";

pub const HELP: &str = "❔ What I can do:\n\n\
• Answer questions sent as text or voice notes\n\
• Read PDF, DOCX and TXT documents and answer about their contents\n\
• Describe photos and solve tasks they contain (send a caption to steer me)\n\n\
I remember the last few exchanges of our conversation, so follow-up \
questions work. Use /support if something is broken.";

pub const SUPPORT: &str = "🛠 Having trouble? Write to our support team.";

pub const SUBSCRIBE_PROMPT: &str =
    "💙 To use the bot, please subscribe to our official channel first.";
pub const SUBSCRIBE_BUTTON: &str = "Subscribe to the channel";
pub const CHECK_SUBSCRIPTION_BUTTON: &str = "✅ Check subscription";
pub const SUPPORT_BUTTON: &str = "Write to support 💬";
pub const SUBSCRIPTION_CONFIRMED: &str = "✅ Thanks for subscribing! You now have access to the bot.";
pub const ACCESS_OPEN: &str = "✅ Access granted! Send me your question.";
pub const NOT_SUBSCRIBED_ALERT: &str = "❌ You haven't subscribed to the channel yet";

pub const ERROR_GENERIC: &str = "Something went wrong while processing your request. Please try again.";
pub const ERROR_VOICE: &str = "Couldn't process your voice message. Please try again or send text.";
pub const ERROR_DOCUMENT: &str = "Couldn't read your document. Please try again.";
pub const ERROR_DOCUMENT_EMPTY: &str = "Couldn't extract any text from the document.";
pub const ERROR_UNSUPPORTED_DOCUMENT: &str =
    "Unsupported document type. Send a PDF, DOCX or TXT file.";
pub const ERROR_EMPTY_RESPONSE: &str = "Something went wrong: the model returned an empty answer.";
pub const ERROR_TOO_LONG: &str = "Unfortunately your message is too long. \
Please shorten it to get an answer.";
pub const ERROR_TOO_MANY_IMAGES: &str = "Too many images at once. Please send fewer.";
pub const ERROR_IMAGE_TOO_LARGE: &str = "The image is too large. Please send a smaller one.";
pub const ERROR_UNSUPPORTED_MESSAGE: &str =
    "I can only work with text, voice notes, documents and photos.";

pub const DEFAULT_PHOTO_PROMPT: &str =
    "Solve the task in the image, or describe what is shown, using the conversation context.";
