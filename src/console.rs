//! Line-oriented front-end. Each line is either a run of calculator keys
//! (`12+3=`) or a word command.

use crate::{
    app::AppInput,
    calculator::ButtonToken,
    error::SafetyError,
    models::EmergencyContact,
    settings::SetupDraft,
};

pub const HELP: &str = "\
keys:      0-9 . + - * / = % ~ c   (e.g. 12*3=)
hold       long-press the display (settings)
close      leave settings
unlock <code>
contact add <name> <phone> [guardian]
contact rm <id>
contacts
trigger <keys>
setup name=<n> phone=<p> trigger=<keys> code=<c> confirm=<c> contact=<name>:<phone>[:guardian]
off        power button (during an emergency)
safe <code>
status | history | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Keys(Vec<ButtonToken>),
    Input(AppInput),
    AddContact(EmergencyContact),
    RemoveContact(String),
    ListContacts,
    SetTrigger(String),
    Setup(SetupDraft),
    Status,
    History,
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, SafetyError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "hold" => Command::Input(AppInput::SettingsRequested),
        "close" => Command::Input(AppInput::CloseSettings),
        "off" => Command::Input(AppInput::DecoyRequested),
        "unlock" => Command::Input(AppInput::UnlockSettings(single_arg(&rest, "unlock")?)),
        "safe" => Command::Input(AppInput::Deactivate(single_arg(&rest, "safe")?)),
        "trigger" => Command::SetTrigger(single_arg(&rest, "trigger")?),
        "contact" => parse_contact(&rest)?,
        "contacts" => Command::ListContacts,
        "setup" => Command::Setup(parse_setup(&rest)?),
        "status" => Command::Status,
        "history" => Command::History,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Keys(parse_keys(line)?),
    };
    Ok(Some(command))
}

fn parse_keys(line: &str) -> Result<Vec<ButtonToken>, SafetyError> {
    line.chars()
        .filter(|key| !key.is_whitespace())
        .map(|key| {
            ButtonToken::from_key(key)
                .ok_or_else(|| SafetyError::config(format!("unknown key '{key}'")))
        })
        .collect()
}

fn single_arg(rest: &[&str], command: &str) -> Result<String, SafetyError> {
    match rest {
        [value] => Ok((*value).to_string()),
        _ => Err(SafetyError::config(format!("usage: {command} <value>"))),
    }
}

fn parse_contact(rest: &[&str]) -> Result<Command, SafetyError> {
    match rest {
        ["add", name, phone] => Ok(Command::AddContact(EmergencyContact::new(
            name, phone, None, false,
        )?)),
        ["add", name, phone, "guardian"] => Ok(Command::AddContact(EmergencyContact::new(
            name, phone, None, true,
        )?)),
        ["rm", id] => Ok(Command::RemoveContact((*id).to_string())),
        _ => Err(SafetyError::config(
            "usage: contact add <name> <phone> [guardian] | contact rm <id>",
        )),
    }
}

fn parse_contact_spec(spec: &str) -> Result<EmergencyContact, SafetyError> {
    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        [name, phone] => EmergencyContact::new(name, phone, None, false),
        [name, phone, "guardian"] => EmergencyContact::new(name, phone, None, true),
        _ => Err(SafetyError::config(format!(
            "contact must be <name>:<phone>[:guardian], got '{spec}'"
        ))),
    }
}

fn parse_setup(rest: &[&str]) -> Result<SetupDraft, SafetyError> {
    let mut draft = SetupDraft::default();

    for token in rest {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| SafetyError::config(format!("expected key=value, got '{token}'")))?;
        match key {
            "name" => draft.owner_name = value.to_string(),
            "phone" => draft.owner_phone = value.to_string(),
            "trigger" => draft.trigger_sequence = value.to_string(),
            "code" => draft.deactivation_code = value.to_string(),
            "confirm" => draft.confirm_code = value.to_string(),
            "contact" => draft.contacts.push(parse_contact_spec(value)?),
            other => return Err(SafetyError::config(format!("unknown setup field '{other}'"))),
        }
    }

    Ok(draft)
}
