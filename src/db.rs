// src/db.rs

use mongodb::{options::ClientOptions, Client, Collection, Database};

use crate::models::{Admin, Department, Employee, Lead, Manager, Target};

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Self {
        let client_options = ClientOptions::parse(uri)
            .await
            .expect("Failed to parse MongoDB connection string");
        let client = Client::with_options(client_options).expect("Failed to initialize client");
        let db = client.database(db_name);
        MongoDB { client, db }
    }

    pub fn admins(&self) -> Collection<Admin> {
        self.db.collection("admins")
    }

    pub fn managers(&self) -> Collection<Manager> {
        self.db.collection("managers")
    }

    pub fn employees(&self) -> Collection<Employee> {
        self.db.collection("employees")
    }

    pub fn departments(&self) -> Collection<Department> {
        self.db.collection("departments")
    }

    pub fn targets(&self) -> Collection<Target> {
        self.db.collection("targets")
    }

    pub fn leads(&self) -> Collection<Lead> {
        self.db.collection("leads")
    }
}
