use std::path::PathBuf;

use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use conecta::errors::AppError;
use conecta::models::{ContractRequest, ContractStatus, Message, NewPlan, Plan, PlanChanges, Profile};
use conecta::auth::{RegisterOutcome, RegisterRequest};
use conecta::AppState;

#[derive(Debug, Parser)]
#[command(name = "conecta", version, about = "Tigo Conecta: planes, solicitudes y chat")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a customer account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Email a password reset link
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        redirect_to: Option<String>,
    },
    /// Change the password of the signed-in user
    SetPassword {
        #[arg(long)]
        password: String,
    },
    /// Show the signed-in user
    Whoami,
    /// Update name and phone
    Profile {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    #[command(subcommand)]
    Plans(PlanCommand),
    #[command(subcommand)]
    Contracts(ContractCommand),
    #[command(subcommand)]
    Chat(ChatCommand),
}

#[derive(Debug, Subcommand)]
pub enum PlanCommand {
    /// List the catalog (customers see active plans only)
    List,
    Show { id: i64 },
    Create(PlanFields),
    Update {
        id: i64,
        #[command(flatten)]
        fields: PlanUpdateFields,
    },
    /// Activate or deactivate a plan
    Toggle {
        id: i64,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
    Delete { id: i64 },
    /// Upload an image and attach it to a plan
    Image { id: i64, file: PathBuf },
}

#[derive(Debug, Args)]
pub struct PlanFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    price: f64,
    #[arg(long)]
    data: String,
    #[arg(long)]
    minutes: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    promotion: Option<String>,
    #[arg(long)]
    inactive: bool,
}

#[derive(Debug, Args)]
pub struct PlanUpdateFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    data: Option<String>,
    #[arg(long)]
    minutes: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    promotion: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ContractCommand {
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<ContractStatus>,
    },
    /// Request a plan (customers)
    Request { plan_id: i64 },
    Approve { id: i64 },
    Reject { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum ChatCommand {
    /// People you can chat with
    Contacts,
    History { with: Uuid },
    Send { to: Uuid, text: String },
    /// Print the conversation and follow new messages until Ctrl-C
    Listen { with: Uuid },
}

fn parse_status(value: &str) -> Result<ContractStatus, String> {
    match value {
        "pendiente" | "pending" => Ok(ContractStatus::Pending),
        "aprobado" | "approved" => Ok(ContractStatus::Approved),
        "rechazado" | "rejected" => Ok(ContractStatus::Rejected),
        other => Err(format!("unknown status '{other}'")),
    }
}

pub async fn run(command: Command, state: &AppState) -> Result<(), AppError> {
    match command {
        Command::Register {
            email,
            password,
            name,
            phone,
        } => {
            let outcome = state
                .auth
                .register(RegisterRequest {
                    email,
                    password,
                    full_name: name,
                    phone,
                })
                .await?;
            match outcome {
                RegisterOutcome::SignedIn(profile) => {
                    println!("Cuenta creada. Bienvenido, {}.", profile.full_name)
                }
                RegisterOutcome::ConfirmationPending { email } => {
                    println!("Revisa {email} para confirmar tu cuenta.")
                }
            }
        }
        Command::Login { email, password } => {
            let profile = state.auth.login(&email, &password).await?;
            println!("Hola, {} ({}).", profile.full_name, profile.role);
        }
        Command::Logout => {
            state.auth.logout().await?;
            println!("Sesión cerrada.");
        }
        Command::ResetPassword { email, redirect_to } => {
            state
                .auth
                .request_password_reset(&email, redirect_to.as_deref())
                .await?;
            println!("Te enviamos un enlace para restablecer tu contraseña.");
        }
        Command::SetPassword { password } => {
            state.auth.update_password(&password).await?;
            println!("Contraseña actualizada.");
        }
        Command::Whoami => match state.auth.current_user().await? {
            Some(profile) => print_profile(&profile),
            None => println!("No has iniciado sesión."),
        },
        Command::Profile { name, phone } => {
            let me = state.auth.require_user().await?;
            let profile = state.auth.update_profile(&me, &name, &phone).await?;
            print_profile(&profile);
        }
        Command::Plans(cmd) => run_plans(cmd, state).await?,
        Command::Contracts(cmd) => run_contracts(cmd, state).await?,
        Command::Chat(cmd) => run_chat(cmd, state).await?,
    }
    Ok(())
}

async fn run_plans(command: PlanCommand, state: &AppState) -> Result<(), AppError> {
    match command {
        PlanCommand::List => {
            let plans = match state.auth.current_user().await? {
                Some(me) => state.plans.list_for(&me).await?,
                None => state.plans.list_active().await?,
            };
            if plans.is_empty() {
                println!("No hay planes disponibles.");
            }
            for plan in &plans {
                print_plan(plan);
            }
        }
        PlanCommand::Show { id } => print_plan(&state.plans.get(id).await?),
        PlanCommand::Create(fields) => {
            let me = state.auth.require_user().await?;
            let plan = state
                .plans
                .create(
                    &me,
                    NewPlan {
                        name: fields.name,
                        price: fields.price,
                        data_allowance: fields.data,
                        minutes: fields.minutes,
                        description: fields.description,
                        promotion: fields.promotion,
                        image_url: None,
                        active: !fields.inactive,
                    },
                )
                .await?;
            print_plan(&plan);
        }
        PlanCommand::Update { id, fields } => {
            let me = state.auth.require_user().await?;
            let changes = PlanChanges {
                name: fields.name,
                price: fields.price,
                data_allowance: fields.data,
                minutes: fields.minutes,
                description: fields.description,
                promotion: fields.promotion,
                ..Default::default()
            };
            print_plan(&state.plans.update(&me, id, changes).await?);
        }
        PlanCommand::Toggle { id, active } => {
            let me = state.auth.require_user().await?;
            print_plan(&state.plans.set_active(&me, id, active).await?);
        }
        PlanCommand::Delete { id } => {
            let me = state.auth.require_user().await?;
            state.plans.delete(&me, id).await?;
            println!("Plan {id} eliminado.");
        }
        PlanCommand::Image { id, file } => {
            let me = state.auth.require_user().await?;
            let body = tokio::fs::read(&file).await?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let plan = state
                .plans
                .attach_image(&me, id, &file_name, Bytes::from(body))
                .await?;
            print_plan(&plan);
        }
    }
    Ok(())
}

async fn run_contracts(command: ContractCommand, state: &AppState) -> Result<(), AppError> {
    let me = state.auth.require_user().await?;
    match command {
        ContractCommand::List { status } => {
            let requests = state.contracts.list_for(&me, status).await?;
            if requests.is_empty() {
                println!("No hay solicitudes.");
            }
            for request in &requests {
                print_contract(request);
            }
        }
        ContractCommand::Request { plan_id } => {
            print_contract(&state.contracts.request(&me, plan_id).await?);
        }
        ContractCommand::Approve { id } => {
            print_contract(&state.contracts.approve(&me, id).await?);
        }
        ContractCommand::Reject { id } => {
            print_contract(&state.contracts.reject(&me, id).await?);
        }
    }
    Ok(())
}

async fn run_chat(command: ChatCommand, state: &AppState) -> Result<(), AppError> {
    let me = state.auth.require_user().await?;
    match command {
        ChatCommand::Contacts => {
            for contact in state.chat.contacts(&me).await? {
                println!("{}  {}", contact.id, contact.full_name);
            }
        }
        ChatCommand::History { with } => {
            for message in state.chat.history(&me, with).await? {
                print_message(&me, &message);
            }
        }
        ChatCommand::Send { to, text } => {
            let message = state.chat.send(Some(me.id), Some(to), &text).await?;
            print_message(&me, &message);
        }
        ChatCommand::Listen { with } => {
            let mut conversation = state.chat.open(&me, with).await?;
            for message in conversation.messages() {
                print_message(&me, message);
            }
            let mut feed = state.chat.subscribe(&me, with).await?;
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    next = feed.next() => match next {
                        Some(message) => {
                            if conversation.push(message.clone()) {
                                print_message(&me, &message);
                            }
                        }
                        None => {
                            return Err(AppError::Realtime("la conexión del chat se cerró".to_string()));
                        }
                    },
                }
            }
            feed.unsubscribe();
        }
    }
    Ok(())
}

fn print_profile(profile: &Profile) {
    println!("{}", profile.id);
    println!("  nombre:   {}", profile.full_name);
    println!("  correo:   {}", profile.email.as_deref().unwrap_or("-"));
    println!("  teléfono: {}", profile.phone.as_deref().unwrap_or("-"));
    println!("  rol:      {}", profile.role);
}

fn print_plan(plan: &Plan) {
    let status = if plan.active { "" } else { " [inactivo]" };
    println!(
        "{}  {} - Bs {:.2}/mes - {} datos, {} minutos{}",
        plan.id, plan.name, plan.price, plan.data_allowance, plan.minutes, status
    );
    if let Some(promotion) = &plan.promotion {
        println!("    promo: {promotion}");
    }
}

fn print_contract(request: &ContractRequest) {
    let plan = request
        .plan
        .as_ref()
        .map(|p| p.name.as_str())
        .unwrap_or("-");
    let requester = request
        .requester
        .as_ref()
        .map(|r| r.full_name.as_str())
        .unwrap_or("-");
    println!(
        "{}  {}  plan: {}  cliente: {}  solicitada: {}",
        request.id,
        request.status,
        plan,
        requester,
        request.requested_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_message(me: &Profile, message: &Message) {
    let who = if message.sender_id == me.id { "yo" } else { "ellos" };
    println!(
        "[{}] {}: {}",
        message.created_at.format("%H:%M"),
        who,
        message.content
    );
}
