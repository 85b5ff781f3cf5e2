//! UI Builder module for creating keyboards and formatting messages
//!
//! Handlers produce [`Reply`] values carrying a [`Keyboard`] description; the
//! teloxide markup is only built when a reply is delivered.

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove,
    ReplyMarkup,
};

use crate::callback_data::CallbackAction;
use crate::draft_editor::record_summary;
use crate::localization::t_lang;
use crate::transaction_model::{Category, Transaction, TransactionField, TransactionType};

/// Longest button label, in characters
const MAX_LABEL_CHARS: usize = 40;

/// Category buttons per keyboard row
const CATEGORIES_PER_ROW: usize = 3;

/// Reply-keyboard buttons send their label as text, so the cancel button
/// carries the literal keyword in every language
const CANCEL_LABEL: &str = "Cancel";

/// What a record picker is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    Edit,
    Delete,
}

/// Keyboard attached to a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Keyboard {
    None,
    /// Add income / add expense
    Home,
    /// Reply keyboard with a single cancel button
    CancelOnly,
    /// Per-field edit buttons plus cancel and confirm
    ConfirmCard,
    /// The closed category set of one kind as a reply keyboard
    CategoryPicker(TransactionType),
    /// Per-field edit buttons of a persisted record
    RecordFields(i64),
    DeleteConfirm(i64),
    RecordPicker {
        action: RecordAction,
        records: Vec<Transaction>,
    },
    /// Remove any reply keyboard still shown
    Remove,
}

/// One outgoing message
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// Shorten a label to [`MAX_LABEL_CHARS`] characters, never splitting a char
pub fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    let kept: String = label.chars().take(MAX_LABEL_CHARS - 3).collect();
    format!("{kept}...")
}

fn field_button_key(field: TransactionField) -> &'static str {
    match field {
        TransactionField::Description => "button-edit-description",
        TransactionField::Amount => "button-edit-amount",
        TransactionField::Date => "button-edit-date",
        TransactionField::Category => "button-edit-category",
    }
}

/// Prompt shown when a field is selected for editing
pub fn edit_prompt_key(field: TransactionField) -> &'static str {
    match field {
        TransactionField::Description => "edit-prompt-description",
        TransactionField::Amount => "edit-prompt-amount",
        TransactionField::Date => "edit-prompt-date",
        TransactionField::Category => "edit-prompt-category",
    }
}

/// The keyboard shown with a field prompt: categories get the type-scoped
/// picker, the other fields a cancel-only keyboard
pub fn edit_prompt_keyboard(field: TransactionField, kind: TransactionType) -> Keyboard {
    match field {
        TransactionField::Category => Keyboard::CategoryPicker(kind),
        _ => Keyboard::CancelOnly,
    }
}

fn button(label: String, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(truncate_label(&label), action.to_string())
}

fn field_rows(
    language_code: Option<&str>,
    action: impl Fn(TransactionField) -> CallbackAction,
) -> Vec<Vec<InlineKeyboardButton>> {
    TransactionField::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|field| button(t_lang(field_button_key(*field), language_code), action(*field)))
                .collect()
        })
        .collect()
}

/// Home menu with the two add intents
pub fn create_home_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(
            t_lang("button-add-income", language_code),
            CallbackAction::AddIntent(TransactionType::Income),
        ),
        button(
            t_lang("button-add-expense", language_code),
            CallbackAction::AddIntent(TransactionType::Expense),
        ),
    ]])
}

/// Edit buttons for every field plus cancel and confirm
pub fn create_confirmation_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = field_rows(language_code, CallbackAction::EditDraft);
    rows.push(vec![
        button(t_lang("button-cancel", language_code), CallbackAction::Cancel),
        button(t_lang("button-confirm", language_code), CallbackAction::Confirm),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn create_record_fields_keyboard(id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = field_rows(language_code, |field| CallbackAction::EditRecord { field, id });
    rows.push(vec![button(
        t_lang("button-cancel", language_code),
        CallbackAction::Cancel,
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn create_delete_keyboard(id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(t_lang("button-cancel", language_code), CallbackAction::Cancel),
        button(
            t_lang("button-delete", language_code),
            CallbackAction::ConfirmDelete(id),
        ),
    ]])
}

/// One button per record, labelled with its summary
pub fn create_record_picker_keyboard(
    action: RecordAction,
    records: &[Transaction],
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = records
        .iter()
        .filter_map(|record| {
            let id = record.id?;
            let callback = match action {
                RecordAction::Edit => CallbackAction::SelectRecord(id),
                RecordAction::Delete => CallbackAction::SelectDelete(id),
            };
            Some(vec![button(record_summary(record), callback)])
        })
        .collect();
    rows.push(vec![button(
        t_lang("button-cancel", language_code),
        CallbackAction::Cancel,
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Reply keyboard listing the categories of `kind`
pub fn create_category_keyboard(kind: TransactionType) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = Category::for_type(kind)
        .chunks(CATEGORIES_PER_ROW)
        .map(|chunk| chunk.iter().map(|c| KeyboardButton::new(c.as_str())).collect())
        .collect();
    rows.push(vec![KeyboardButton::new(CANCEL_LABEL)]);

    KeyboardMarkup::new(rows).resize_keyboard().one_time_keyboard()
}

pub fn create_cancel_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(CANCEL_LABEL)]])
        .resize_keyboard()
        .one_time_keyboard()
}

/// Build the teloxide markup for a keyboard description
pub fn to_reply_markup(keyboard: &Keyboard, language_code: Option<&str>) -> Option<ReplyMarkup> {
    let markup = match keyboard {
        Keyboard::None => return None,
        Keyboard::Home => create_home_keyboard(language_code).into(),
        Keyboard::CancelOnly => create_cancel_keyboard().into(),
        Keyboard::ConfirmCard => create_confirmation_keyboard(language_code).into(),
        Keyboard::CategoryPicker(kind) => create_category_keyboard(*kind).into(),
        Keyboard::RecordFields(id) => create_record_fields_keyboard(*id, language_code).into(),
        Keyboard::DeleteConfirm(id) => create_delete_keyboard(*id, language_code).into(),
        Keyboard::RecordPicker { action, records } => {
            create_record_picker_keyboard(*action, records, language_code).into()
        }
        Keyboard::Remove => KeyboardRemove::new().into(),
    };
    Some(markup)
}

/// A numbered list of transactions, one summary per line
pub fn format_transactions_list(records: &[Transaction]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let marker = match record.kind {
                TransactionType::Income => "💰",
                TransactionType::Expense => "💸",
            };
            format!("{}. {} {}", i + 1, marker, record_summary(record))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
