//! Cold staking delegation form.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    action::Action,
    domain::{
        amount::display_coins,
        delegation::{FieldErrors, FormFields},
        fee_estimator::FeeEstimate,
        pipeline::{PipelineState, Stage},
    },
    tui::Frame,
};

use super::Component;

/// Input field focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    HotAddress,
    Amount,
    Password,
    FeeTier,
    Confirm,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::HotAddress => FormField::Amount,
            FormField::Amount => FormField::Password,
            FormField::Password => FormField::FeeTier,
            FormField::FeeTier => FormField::Confirm,
            FormField::Confirm => FormField::HotAddress,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::HotAddress => FormField::Confirm,
            FormField::Amount => FormField::HotAddress,
            FormField::Password => FormField::Amount,
            FormField::FeeTier => FormField::Password,
            FormField::Confirm => FormField::FeeTier,
        }
    }

    fn is_text(self) -> bool {
        matches!(
            self,
            FormField::HotAddress | FormField::Amount | FormField::Password
        )
    }
}

/// Form for delegating stake to a hot wallet address.
pub struct ColdStakingComponent {
    action_tx: UnboundedSender<Action>,
    pub fields: FormFields,
    pub dirty: bool,
    pub focused_field: FormField,
    pub is_editing: bool,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
    pub estimate: FeeEstimate,
    pub balance_loaded: bool,
    pub fee_error: Option<String>,
    pub pipeline: PipelineState,
    pub coin_unit: String,
}

impl ColdStakingComponent {
    pub fn new(action_tx: UnboundedSender<Action>, coin_unit: &str) -> Self {
        Self {
            action_tx,
            fields: FormFields::default(),
            dirty: false,
            focused_field: FormField::HotAddress,
            is_editing: false,
            error_message: None,
            success_message: None,
            estimate: FeeEstimate::default(),
            balance_loaded: false,
            fee_error: None,
            pipeline: PipelineState::default(),
            coin_unit: coin_unit.to_string(),
        }
    }

    /// Clear all input fields.
    pub fn clear(&mut self) {
        self.fields = FormFields::default();
        self.dirty = false;
        self.focused_field = FormField::HotAddress;
        self.is_editing = false;
        self.error_message = None;
    }

    pub fn field_errors(&self) -> FieldErrors {
        self.fields
            .field_errors(self.estimate.max_amount(), self.dirty)
    }

    /// Replace the amount, e.g. with the whole spendable balance.
    pub fn set_amount(&mut self, amount: String) -> Result<()> {
        self.fields.amount = amount;
        self.changed()
    }

    /// Append pasted text to the focused text field.
    pub fn paste(&mut self, text: &str) -> Result<()> {
        if !self.focused_field.is_text() {
            return Ok(());
        }
        for c in text.trim().chars() {
            self.push_char(c);
        }
        self.changed()
    }

    fn changed(&mut self) -> Result<()> {
        self.dirty = true;
        self.success_message = None;
        self.action_tx.send(Action::FormChanged)?;
        Ok(())
    }

    fn push_char(&mut self, c: char) {
        match self.focused_field {
            FormField::HotAddress => self.fields.hot_wallet_address.push(c),
            FormField::Amount => {
                // Only allow digits and decimal point
                if c.is_ascii_digit() || (c == '.' && !self.fields.amount.contains('.')) {
                    self.fields.amount.push(c);
                }
            }
            FormField::Password => self.fields.password.push(c),
            FormField::FeeTier | FormField::Confirm => {}
        }
    }

    fn pop_char(&mut self) {
        match self.focused_field {
            FormField::HotAddress => {
                self.fields.hot_wallet_address.pop();
            }
            FormField::Amount => {
                self.fields.amount.pop();
            }
            FormField::Password => {
                self.fields.password.pop();
            }
            FormField::FeeTier | FormField::Confirm => {}
        }
    }

    fn field_style(&self, field: FormField) -> (Style, Style) {
        let focused = self.focused_field == field;
        let text = match (focused, self.is_editing) {
            (true, true) => Style::default().fg(Color::Yellow),
            (true, false) => Style::default().fg(Color::Cyan),
            _ => Style::default().fg(Color::White),
        };
        let border = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        (text, border)
    }

    fn input(&self, field: FormField, title: &str, value: String, error: Option<&str>) -> Paragraph<'static> {
        let (text_style, border_style) = self.field_style(field);
        let focused = self.focused_field == field;

        let mut display = value;
        if self.is_editing && focused {
            display.push('│');
        }

        let mut lines = vec![Line::from(vec![Span::styled(display, text_style)])];
        if let Some(err) = error {
            lines.push(Line::from(vec![Span::styled(
                err.to_string(),
                Style::default().fg(Color::Red),
            )]));
        }

        Paragraph::new(lines).block(
            Block::default()
                .title(format!("{} {}", if focused { ">" } else { " " }, title))
                .borders(Borders::ALL)
                .border_style(border_style),
        )
    }

    fn summary_lines(&self) -> Vec<Line<'static>> {
        let unit = self.coin_unit.as_str();
        if !self.balance_loaded {
            return vec![Line::from(vec![Span::styled(
                "Loading spendable balance...",
                Style::default().fg(Color::DarkGray),
            )])];
        }
        vec![Line::from(vec![
            Span::styled("Spendable: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                display_coins(self.estimate.max_spendable_amount, unit),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  |  "),
            Span::styled("Fee: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                display_coins(self.estimate.fee, unit),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  |  "),
            Span::styled("Max: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                display_coins(self.estimate.max_amount(), unit),
                Style::default().fg(Color::White),
            ),
        ])]
    }

    fn status_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if self.pipeline.is_sending {
            lines.push(Line::from(vec![Span::styled(
                format!("{}...", self.pipeline.stage.label()),
                Style::default().fg(Color::Yellow),
            )]));
        }

        if let Some(err) = &self.error_message {
            lines.push(Line::from(vec![Span::styled(
                format!("Error: {}", err),
                Style::default().fg(Color::Red),
            )]));
        } else if let Some(err) = &self.fee_error {
            lines.push(Line::from(vec![Span::styled(
                format!("Fee estimate: {}", err),
                Style::default().fg(Color::Red),
            )]));
        } else if let Some(success) = &self.success_message {
            lines.push(Line::from(vec![Span::styled(
                success.clone(),
                Style::default().fg(Color::Green),
            )]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(vec![Span::styled(
            if self.is_editing {
                "[Esc] Stop editing  [Tab/↓] Next field  [Shift+Tab/↑] Prev field"
            } else {
                "[Enter/e] Edit  [Tab/↓] Next  [m] Max amount  [c] Clear  [Enter on Delegate] Send"
            },
            Style::default().fg(Color::DarkGray),
        )]));
        lines
    }

    /// Fold a pipeline update into the form's messages.
    pub fn set_pipeline_state(&mut self, state: PipelineState) {
        match state.stage {
            Stage::Succeeded => {
                if let Some(tx_id) = &state.transaction_id {
                    self.success_message = Some(format!("Delegation sent! Transaction: {}", tx_id));
                }
                self.error_message = None;
            }
            Stage::Failed => {
                self.error_message = state.error_message.clone();
            }
            _ => {}
        }
        self.pipeline = state;
    }
}

impl Component for ColdStakingComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        let on_input_field = self.focused_field.is_text();

        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                self.is_editing = false;
                self.focused_field = self.focused_field.next();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.is_editing = false;
                self.focused_field = self.focused_field.prev();
            }
            KeyCode::Esc => {
                self.is_editing = false;
            }
            KeyCode::Enter => match self.focused_field {
                FormField::Confirm => {
                    self.error_message = None;
                    self.action_tx.send(Action::SendDelegation)?;
                }
                FormField::FeeTier => {
                    self.fields.fee_tier = self.fields.fee_tier.next();
                    self.changed()?;
                }
                _ => {
                    // Enter on input field toggles editing mode
                    self.is_editing = !self.is_editing;
                }
            },
            KeyCode::Char(c) => {
                if self.is_editing && on_input_field {
                    self.push_char(c);
                    self.changed()?;
                } else if !self.is_editing {
                    match c {
                        'j' => self.focused_field = self.focused_field.next(),
                        'k' => self.focused_field = self.focused_field.prev(),
                        'c' => {
                            self.clear();
                            self.action_tx.send(Action::FormChanged)?;
                        }
                        'm' => self.action_tx.send(Action::UseMaxBalance)?,
                        'e' if on_input_field => self.is_editing = true,
                        _ => {}
                    }
                }
            }
            KeyCode::Backspace => {
                if self.is_editing && on_input_field {
                    self.pop_char();
                    self.changed()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn draw(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::vertical([
            Constraint::Length(3), // Balance and fee
            Constraint::Length(4), // Hot address
            Constraint::Length(4), // Amount
            Constraint::Length(4), // Password
            Constraint::Length(3), // Fee tier
            Constraint::Length(3), // Delegate button
            Constraint::Min(0),    // Status/help
        ])
        .split(area);

        let summary = Paragraph::new(self.summary_lines()).block(
            Block::default()
                .title("Cold Staking")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(summary, chunks[0]);

        let errors = self.field_errors();
        let address = self.input(
            FormField::HotAddress,
            "Hot Wallet Address",
            self.fields.hot_wallet_address.clone(),
            errors.hot_wallet_address.as_deref(),
        );
        f.render_widget(address, chunks[1]);

        let amount = self.input(
            FormField::Amount,
            &format!("Amount ({})", self.coin_unit),
            self.fields.amount.clone(),
            errors.amount.as_deref(),
        );
        f.render_widget(amount, chunks[2]);

        let password = self.input(
            FormField::Password,
            "Wallet Password",
            "*".repeat(self.fields.password.chars().count()),
            errors.password.as_deref(),
        );
        f.render_widget(password, chunks[3]);

        let fee_tier = self.input(
            FormField::FeeTier,
            "Fee ([Enter] to change)",
            self.fields.fee_tier.to_string(),
            None,
        );
        f.render_widget(fee_tier, chunks[4]);

        let confirm_style = if self.focused_field == FormField::Confirm {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Green)
        };
        let label = if self.pipeline.is_sending {
            "  [ Sending... ]  "
        } else {
            "  [ Delegate ]  "
        };
        let confirm = Paragraph::new(Line::from(vec![Span::styled(label, confirm_style)])).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(self.field_style(FormField::Confirm).1),
        );
        f.render_widget(confirm, chunks[5]);

        let status = Paragraph::new(self.status_lines()).block(
            Block::default()
                .title("Status")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(status, chunks[6]);
    }

    fn is_editing(&self) -> bool {
        self.is_editing
    }
}
