use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use boompi::assistant::albums::AlbumPhoto;
use boompi::assistant::{Assistant, TelegramClient};
use boompi::config::Config;
use boompi::keyboards::{self, Command};
use boompi::texts;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "boompi.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging: stdout plus a non-blocking file appender
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("boompi.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting boompi...");
    info!("Loaded config from {config_path}");
    if let Some(ref channel) = config.channel_username {
        info!("Subscription gate enabled ({channel})");
    }

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to set command menu: {e}");
    }

    let telegram = Arc::new(TelegramClient::new(bot.clone()));
    let assistant = match Assistant::new(config, telegram) {
        Ok(assistant) => Arc::new(assistant),
        Err(e) => {
            panic!("Failed to start assistant: {e}");
        }
    };

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    // The default distribution handles updates from the same chat
    // sequentially, so at most one turn per user is in flight.
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![assistant])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    assistant: Arc<Assistant>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, texts::GREETING).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, texts::HELP).await?;
        }
        Command::Support => {
            let mut request = bot.send_message(msg.chat.id, texts::SUPPORT);
            if let Some(support) = assistant.config().support_username.as_deref()
                && let Some(keyboard) = keyboards::support_keyboard(support)
            {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
    }
    Ok(())
}

async fn handle_message(msg: Message, assistant: Arc<Assistant>) -> ResponseResult<()> {
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let user_id = user.id.0;

    let result = if let Some(voice) = msg.voice() {
        info!("🎙 Voice note from {user_id}");
        assistant.process_voice(chat_id, user_id, &voice.file.id.0).await
    } else if let Some(doc) = msg.document() {
        let file_name = doc.file_name.clone().unwrap_or_else(|| "document".to_string());
        info!("📄 Document \"{file_name}\" from {user_id}");
        assistant
            .process_document(chat_id, user_id, &doc.file.id.0, &file_name, msg.caption())
            .await
    } else if let Some(photos) = msg.photo() {
        let Some(photo) = photos.last() else {
            return Ok(());
        };
        let caption = msg.caption().map(str::to_string);
        if let Some(group_id) = msg.media_group_id() {
            info!("🖼 Album photo from {user_id} (group {})", group_id.0);
            let photo = AlbumPhoto { file_id: photo.file.id.0.clone(), caption };
            Arc::clone(&assistant)
                .queue_album_photo(chat_id, user_id, &group_id.0, photo)
                .await;
            return Ok(());
        }
        info!("🖼 Photo from {user_id}");
        assistant
            .process_photos(chat_id, user_id, caption, std::slice::from_ref(&photo.file.id.0))
            .await
    } else if let Some(text) = msg.text() {
        let preview: String = text.chars().take(80).collect();
        info!("📨 {user_id}: \"{preview}\"");
        assistant.process_text(chat_id, user_id, text).await
    } else {
        assistant
            .telegram()
            .send_plain(chat_id, texts::ERROR_UNSUPPORTED_MESSAGE)
            .await
            .ok();
        return Ok(());
    };

    if let Err(e) = result {
        assistant.report_error(chat_id, &e).await;
    }
    Ok(())
}

async fn handle_callback(q: CallbackQuery, assistant: Arc<Assistant>) -> ResponseResult<()> {
    let telegram = assistant.telegram();

    if q.data.as_deref() != Some(keyboards::CHECK_SUBSCRIPTION) {
        telegram.answer_callback(&q.id, "", false).await.ok();
        return Ok(());
    }

    if assistant.is_subscribed(q.from.id.0).await {
        telegram
            .answer_callback(&q.id, texts::SUBSCRIPTION_CONFIRMED, false)
            .await
            .ok();
        // Replace the prompt with a confirmation
        if let Some(message) = q.message {
            let chat_id = message.chat().id.0;
            telegram.delete_message(chat_id, message.id().0 as i64).await.ok();
            telegram.send_plain(chat_id, texts::ACCESS_OPEN).await.ok();
        }
    } else {
        let channel = assistant
            .config()
            .channel_username
            .clone()
            .unwrap_or_default();
        let text = format!("{} {}", texts::NOT_SUBSCRIBED_ALERT, channel);
        telegram.answer_callback(&q.id, &text, true).await.ok();
    }
    Ok(())
}
